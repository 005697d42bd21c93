//! The blocklist filter consumed by the command handlers.
//!
//! The dispatcher only ever talks to a [`BlocklistFilter`]. The filter owns the
//! domain membership index, the tag table and the user flag encoding; commands
//! borrow it read-only for the duration of a single request.
//!
//! [`InMemoryFilter`] is a small reference implementation used by the binary
//! and the tests.
//!
//! # Example
//!
//! ```
//! use blocklist_control::filter::{BlocklistFilter, InMemoryFilter, TagInfo};
//!
//! let filter = InMemoryFilter::new([TagInfo::new(0, "ADS", "Ad servers")])
//!     .unwrap()
//!     .with_domain("ads.example.com", ["ADS"])
//!     .unwrap();
//!
//! let matches = filter.had_domain_name("tracker.ads.example.com").unwrap().unwrap();
//! assert_eq!(matches[0].key, "ads.example.com");
//! assert_eq!(filter.tags_for_flag(&matches[0].flag).unwrap(), vec!["ADS"]);
//! ```

pub mod flag;
pub mod loader;
mod memory;

use serde::{Deserialize, Serialize};

pub use memory::InMemoryFilter;

/// Error type for filter operations.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// A tag name that is not part of the tag table.
    #[error("unknown blocklist tag: {0:?}")]
    UnknownTag(String),

    /// A flag bit that does not correspond to any tag.
    #[error("no blocklist tag has value {0}")]
    UnknownTagValue(u16),

    /// The requested flag encoding version is not supported.
    #[error("unsupported flag version: {0}")]
    UnsupportedFlagVersion(i64),

    /// Flag words that do not follow the header/group layout.
    #[error("malformed flag: {0}")]
    MalformedFlag(String),

    /// A tag whose value does not fit in the flag layout.
    #[error("tag {uname:?} has out of range value {value}")]
    TagValueOutOfRange {
        /// Tag name.
        uname: String,
        /// Offending value.
        value: u16,
    },

    /// Two tags sharing the same flag bit.
    #[error("tags {first:?} and {second:?} share value {value}")]
    DuplicateTagValue {
        /// Shared value.
        value: u16,
        /// Tag registered first.
        first: String,
        /// Tag registered second.
        second: String,
    },
}

/// Human-readable descriptor of a blocklist tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    /// Bit position of the tag inside a user flag.
    pub value: u16,
    /// Short unique name, used as the tag identifier.
    #[serde(default)]
    pub uname: String,
    /// Display name.
    pub vname: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub subg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<u64>,
}

impl TagInfo {
    /// Create a descriptor with only the required fields set.
    pub fn new(value: u16, uname: impl Into<String>, vname: impl Into<String>) -> Self {
        Self {
            value,
            uname: uname.into(),
            vname: vname.into(),
            group: String::new(),
            subg: String::new(),
            url: None,
            show: None,
            entries: None,
        }
    }

    /// Set the group and subgroup.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>, subg: impl Into<String>) -> Self {
        self.group = group.into();
        self.subg = subg.into();
        self
    }
}

/// One hit of a domain membership lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainMatch {
    /// The indexed name that matched (the domain itself or one of its parents).
    pub key: String,
    /// Encoded membership value, see [`flag`].
    pub flag: Vec<u16>,
}

/// Result of decoding a user supplied base64 flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedFlag {
    pub is_valid_flag: bool,
    pub user_blocklist_flag_uint: Vec<u16>,
}

impl DecodedFlag {
    /// A flag that failed to decode.
    pub const fn invalid() -> Self {
        Self {
            is_valid_flag: false,
            user_blocklist_flag_uint: Vec::new(),
        }
    }

    pub const fn valid(words: Vec<u16>) -> Self {
        Self {
            is_valid_flag: true,
            user_blocklist_flag_uint: words,
        }
    }
}

/// Capabilities the command handlers require from a blocklist filter.
///
/// Implementations must be safe to share between concurrent requests; the
/// handlers never mutate the filter. If the data can be reloaded at runtime,
/// the swap has to be atomic from the point of view of these methods.
pub trait BlocklistFilter: Send + Sync {
    /// Look up a domain name.
    ///
    /// Returns `None` when neither the name nor any indexed parent matched.
    fn had_domain_name(&self, domain: &str) -> Result<Option<Vec<DomainMatch>>, FilterError>;

    /// Resolve encoded flag words to the tag names they contain.
    fn tags_for_flag(&self, flag: &[u16]) -> Result<Vec<String>, FilterError>;

    /// Descriptor for a tag name, if the tag is known.
    fn tag_info(&self, tag: &str) -> Option<&TagInfo>;

    /// Encode a set of tag names as a base64 user flag.
    fn b64_flag_from_tags(&self, tags: &[&str], flag_version: i64) -> Result<String, FilterError>;

    /// Decode a base64 user flag.
    ///
    /// Malformed input is reported through [`DecodedFlag::is_valid_flag`],
    /// errors are reserved for failures of the filter itself.
    fn decode_b64_flag(&self, b64: &str) -> Result<DecodedFlag, FilterError>;
}

impl<F: BlocklistFilter + ?Sized> BlocklistFilter for std::sync::Arc<F> {
    fn had_domain_name(&self, domain: &str) -> Result<Option<Vec<DomainMatch>>, FilterError> {
        (**self).had_domain_name(domain)
    }

    fn tags_for_flag(&self, flag: &[u16]) -> Result<Vec<String>, FilterError> {
        (**self).tags_for_flag(flag)
    }

    fn tag_info(&self, tag: &str) -> Option<&TagInfo> {
        (**self).tag_info(tag)
    }

    fn b64_flag_from_tags(&self, tags: &[&str], flag_version: i64) -> Result<String, FilterError> {
        (**self).b64_flag_from_tags(tags, flag_version)
    }

    fn decode_b64_flag(&self, b64: &str) -> Result<DecodedFlag, FilterError> {
        (**self).decode_b64_flag(b64)
    }
}
