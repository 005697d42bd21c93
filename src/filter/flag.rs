//! User flag layout and its base64 forms.
//!
//! A flag is a sequence of `u16` words. The first word is a header where bit
//! `15 - g` marks group `g` as present; it is followed by one word per present
//! group, in ascending group order, where bit `15 - (v % 16)` marks tag value
//! `v`. Sixteen groups of sixteen tags give 256 addressable tags.
//!
//! Version 0 flags are standard base64 of the big-endian words. Version 1
//! flags carry a `1:` prefix followed by URL-safe, unpadded base64.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

use super::FilterError;

/// Number of tags per group word.
const GROUP_SIZE: u16 = 16;

/// Number of groups the header can announce.
const GROUP_COUNT: u16 = 16;

/// Largest tag value representable in a flag.
pub const MAX_TAG_VALUE: u16 = GROUP_SIZE * GROUP_COUNT - 1;

/// Prefix marking a version 1 flag.
pub const V1_PREFIX: &str = "1:";

/// Encode tag values into flag words.
///
/// Values above [`MAX_TAG_VALUE`] are ignored; callers validate them when
/// building their tag table.
pub fn encode_values<I>(values: I) -> Vec<u16>
where
    I: IntoIterator<Item = u16>,
{
    let mut groups = [0u16; GROUP_COUNT as usize];
    for value in values {
        if let Some(bits) = groups.get_mut(usize::from(value / GROUP_SIZE)) {
            *bits |= 1 << (GROUP_SIZE - 1 - value % GROUP_SIZE);
        }
    }

    let mut header = 0u16;
    let mut words = vec![0u16];
    for (group, bits) in (0..GROUP_COUNT).zip(groups) {
        if bits != 0 {
            header |= 1 << (GROUP_COUNT - 1 - group);
            words.push(bits);
        }
    }
    words[0] = header;
    words
}

/// Decode flag words into ascending tag values.
pub fn decode_values(words: &[u16]) -> Result<Vec<u16>, FilterError> {
    let Some((&header, groups)) = words.split_first() else {
        return Err(FilterError::MalformedFlag("empty flag".into()));
    };

    let announced = header.count_ones() as usize;
    if groups.len() != announced {
        return Err(FilterError::MalformedFlag(format!(
            "header announces {announced} groups, found {}",
            groups.len()
        )));
    }

    let present = (0..GROUP_COUNT).filter(|group| header & (1 << (GROUP_COUNT - 1 - group)) != 0);

    let mut values = Vec::new();
    for (group, &bits) in present.zip(groups) {
        for offset in 0..GROUP_SIZE {
            if bits & (1 << (GROUP_SIZE - 1 - offset)) != 0 {
                values.push(group * GROUP_SIZE + offset);
            }
        }
    }
    Ok(values)
}

/// Render flag words in the base64 form for `version`.
pub fn to_b64(words: &[u16], version: i64) -> Result<String, FilterError> {
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
    match version {
        0 => Ok(STANDARD.encode(bytes)),
        1 => Ok(format!("{V1_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))),
        other => Err(FilterError::UnsupportedFlagVersion(other)),
    }
}

/// Parse a base64 flag of either version.
///
/// Returns `None` for anything that is not well-formed base64 or does not
/// decode to a structurally valid flag.
pub fn from_b64(flag: &str) -> Option<Vec<u16>> {
    let bytes = match flag.strip_prefix(V1_PREFIX) {
        Some(rest) => URL_SAFE_NO_PAD.decode(rest.trim_end_matches('=')).ok()?,
        None => STANDARD.decode(flag).ok()?,
    };

    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return None;
    }

    let words: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    decode_values(&words).ok()?;
    Some(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_values_into_header_and_groups() {
        assert_eq!(encode_values([0, 1]), vec![0x8000, 0xC000]);
        assert_eq!(encode_values([17]), vec![0x4000, 0x4000]);
        assert_eq!(encode_values([0, 255]), vec![0x8001, 0x8000, 0x0001]);
    }

    #[test]
    fn should_encode_empty_set_as_bare_header() {
        assert_eq!(encode_values(std::iter::empty()), vec![0]);
        assert_eq!(decode_values(&[0]).unwrap(), Vec::<u16>::new());
    }

    #[test]
    fn should_ignore_out_of_range_values() {
        assert_eq!(encode_values([256, 3]), vec![0x8000, 0x1000]);
    }

    #[test]
    fn should_decode_values_in_ascending_order() {
        let words = encode_values([200, 3, 17, 4]);
        assert_eq!(decode_values(&words).unwrap(), vec![3, 4, 17, 200]);
    }

    #[test]
    fn should_reject_group_count_mismatch() {
        assert!(decode_values(&[]).is_err());
        assert!(decode_values(&[0x8000]).is_err());
        assert!(decode_values(&[0x0000, 0x8000]).is_err());
    }

    #[test]
    fn should_render_version_zero_as_standard_base64() {
        assert_eq!(to_b64(&[0x8000, 0xC000], 0).unwrap(), "gADAAA==");
        assert_eq!(to_b64(&[0], 0).unwrap(), "AAA=");
    }

    #[test]
    fn should_render_version_one_with_prefix() {
        assert_eq!(to_b64(&[0x8000, 0xC000], 1).unwrap(), "1:gADAAA");
    }

    #[test]
    fn should_reject_unknown_versions() {
        assert!(matches!(
            to_b64(&[0], 7),
            Err(FilterError::UnsupportedFlagVersion(7))
        ));
    }

    #[test]
    fn should_parse_both_versions() {
        assert_eq!(from_b64("gADAAA=="), Some(vec![0x8000, 0xC000]));
        assert_eq!(from_b64("1:gADAAA"), Some(vec![0x8000, 0xC000]));
        assert_eq!(from_b64("1:gADAAA=="), Some(vec![0x8000, 0xC000]));
    }

    #[test]
    fn should_reject_malformed_flags() {
        assert_eq!(from_b64(""), None);
        assert_eq!(from_b64("not base64!"), None);
        // single byte
        assert_eq!(from_b64("gA=="), None);
        // header announces two groups, one present
        assert_eq!(from_b64("wADAAA=="), None);
    }
}
