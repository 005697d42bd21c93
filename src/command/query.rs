//! Query string access for command handlers.

use url::Url;

/// Decoded query parameters of a request URL, in their original order.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn from_url(url: &Url) -> Self {
        Self {
            pairs: url.query_pairs().into_owned().collect(),
        }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// First value for `key`, or `""` when absent.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.pairs.iter().any(|(name, _)| name == key)
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Parse the leading integer of `input`.
///
/// Leading whitespace and a single sign are accepted, a `0x`/`0X` prefix
/// switches to hexadecimal, parsing stops at the first non-digit. Returns
/// `None` when no digit is found or the value does not fit in an `i64`.
pub fn parse_leading_int(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (radix, digits) = match unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, unsigned),
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    let magnitude = i64::from_str_radix(&digits[..end], radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_first_value() {
        let url = Url::parse("https://h.test/x?a=1&b=2&a=3").unwrap();
        let params = QueryParams::from_url(&url);

        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("2"));
        assert_eq!(params.get("c"), None);
    }

    #[test]
    fn should_decode_percent_and_plus() {
        let url = Url::parse("https://h.test/x?list=A%2CB&q=a+b").unwrap();
        let params = QueryParams::from_url(&url);

        assert_eq!(params.get("list"), Some("A,B"));
        assert_eq!(params.get("q"), Some("a b"));
    }

    #[test]
    fn should_detect_keys_without_value() {
        let params: QueryParams = [("dns", "")].into_iter().collect();
        assert!(params.has("dns"));
        assert!(!params.has("dn"));
        assert_eq!(params.get_or_empty("dns"), "");
        assert_eq!(params.get_or_empty("dn"), "");
    }

    #[test]
    fn should_parse_leading_integers() {
        assert_eq!(parse_leading_int("1"), Some(1));
        assert_eq!(parse_leading_int("  42abc"), Some(42));
        assert_eq!(parse_leading_int("-3"), Some(-3));
        assert_eq!(parse_leading_int("+7"), Some(7));
    }

    #[test]
    fn should_parse_hex_prefix() {
        assert_eq!(parse_leading_int("0x1"), Some(1));
        assert_eq!(parse_leading_int("0X1f"), Some(31));
        assert_eq!(parse_leading_int(" -0xAzz"), Some(-10));
        assert_eq!(parse_leading_int("0x"), None);
        assert_eq!(parse_leading_int("0xg"), None);
    }

    #[test]
    fn should_reject_non_numeric_input() {
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int("-"), None);
        assert_eq!(parse_leading_int("99999999999999999999"), None);
    }
}
