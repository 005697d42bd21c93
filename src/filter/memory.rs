//! In-memory blocklist filter.

use std::collections::HashMap;

use super::flag::{self, MAX_TAG_VALUE};
use super::{BlocklistFilter, DecodedFlag, DomainMatch, FilterError, TagInfo};

/// A [`BlocklistFilter`] backed by hash maps.
///
/// Domains are stored lowercase without a trailing dot, each mapped to the
/// encoded flag of the tags listing it. Lookups walk from the full name up
/// through its parents, so an entry for `example.com` also matches
/// `ads.example.com`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFilter {
    tags: HashMap<String, TagInfo>,
    names_by_value: HashMap<u16, String>,
    domains: HashMap<String, Vec<u16>>,
}

impl InMemoryFilter {
    /// Build a filter from a tag table.
    ///
    /// # Errors
    ///
    /// Fails if a tag value exceeds [`MAX_TAG_VALUE`] or two tags share a value.
    pub fn new<I>(tags: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = TagInfo>,
    {
        let mut filter = Self::default();
        for tag in tags {
            if tag.value > MAX_TAG_VALUE {
                return Err(FilterError::TagValueOutOfRange {
                    uname: tag.uname,
                    value: tag.value,
                });
            }
            if let Some(first) = filter.names_by_value.get(&tag.value) {
                return Err(FilterError::DuplicateTagValue {
                    value: tag.value,
                    first: first.clone(),
                    second: tag.uname,
                });
            }
            filter.names_by_value.insert(tag.value, tag.uname.clone());
            filter.tags.insert(tag.uname.clone(), tag);
        }
        Ok(filter)
    }

    /// Builder form of [`insert_domain`](Self::insert_domain).
    pub fn with_domain<I, S>(mut self, domain: &str, tags: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.insert_domain(domain, tags)?;
        Ok(self)
    }

    /// Index a domain as listed by the given tags.
    ///
    /// Inserting the same domain again merges the tag sets.
    ///
    /// # Errors
    ///
    /// Fails with [`FilterError::UnknownTag`] if a tag is not in the table.
    pub fn insert_domain<I, S>(&mut self, domain: &str, tags: I) -> Result<(), FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = self.values_for(tags)?;
        let name = normalize(domain);
        if let Some(existing) = self.domains.get(&name) {
            values.extend(flag::decode_values(existing)?);
        }
        self.domains.insert(name, flag::encode_values(values));
        Ok(())
    }

    /// Number of tags in the table.
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Number of indexed domains.
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    fn values_for<I, S>(&self, tags: I) -> Result<Vec<u16>, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .map(|tag| {
                let tag = tag.as_ref();
                self.tags
                    .get(tag)
                    .map(|info| info.value)
                    .ok_or_else(|| FilterError::UnknownTag(tag.to_string()))
            })
            .collect()
    }
}

fn normalize(domain: &str) -> String {
    domain.trim_end_matches('.').to_lowercase()
}

impl BlocklistFilter for InMemoryFilter {
    fn had_domain_name(&self, domain: &str) -> Result<Option<Vec<DomainMatch>>, FilterError> {
        let name = normalize(domain);
        if name.is_empty() {
            return Ok(None);
        }

        let mut matches = Vec::new();
        let mut candidate = name.as_str();
        loop {
            if let Some(flag) = self.domains.get(candidate) {
                matches.push(DomainMatch {
                    key: candidate.to_string(),
                    flag: flag.clone(),
                });
            }
            match candidate.split_once('.') {
                Some((_, parent)) if !parent.is_empty() => candidate = parent,
                _ => break,
            }
        }

        Ok((!matches.is_empty()).then_some(matches))
    }

    fn tags_for_flag(&self, flag: &[u16]) -> Result<Vec<String>, FilterError> {
        // Bits without a tag come from flags built against another tag table.
        Ok(flag::decode_values(flag)?
            .into_iter()
            .filter_map(|value| self.names_by_value.get(&value).cloned())
            .collect())
    }

    fn tag_info(&self, tag: &str) -> Option<&TagInfo> {
        self.tags.get(tag)
    }

    fn b64_flag_from_tags(&self, tags: &[&str], flag_version: i64) -> Result<String, FilterError> {
        let values = self.values_for(tags)?;
        flag::to_b64(&flag::encode_values(values), flag_version)
    }

    fn decode_b64_flag(&self, b64: &str) -> Result<DecodedFlag, FilterError> {
        Ok(flag::from_b64(b64).map_or_else(DecodedFlag::invalid, DecodedFlag::valid))
    }
}
