//! Command handlers.
//!
//! Each handler turns the query of a request into a JSON (or redirect)
//! response. Failures are returned as-is; the dispatcher is the only place
//! that turns them into an exception envelope.

use serde::{Serialize, Serializer};

use super::envelope::{HttpResponse, json_response, redirect};
use super::query::{QueryParams, parse_leading_int};
use crate::error::CommandError;
use crate::filter::{BlocklistFilter, DomainMatch, TagInfo};

/// Value of `list` when a user flag cannot be decoded.
pub const INVALID_B64: &str = "Invalid B64 String";

/// JSON object with keys kept in insertion order.
///
/// A repeated key keeps its first position and takes the last value.
#[derive(Debug)]
struct Entries<V>(Vec<(String, V)>);

impl<V> Entries<V> {
    fn insert(&mut self, key: String, value: V) {
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }
}

impl<V> FromIterator<(String, V)> for Entries<V> {
    fn from_iter<T: IntoIterator<Item = (String, V)>>(iter: T) -> Self {
        let mut entries = Self(Vec::new());
        for (key, value) in iter {
            entries.insert(key, value);
        }
        entries
    }
}

impl<V: Serialize> Serialize for Entries<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(key, value)| (key, value)))
    }
}

/// Per-source membership, serialized as `false` when the domain is not listed.
#[derive(Debug)]
enum Membership<V> {
    Listed(Entries<V>),
    Unlisted,
}

impl<V: Serialize> Serialize for Membership<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Listed(entries) => entries.serialize(serializer),
            Self::Unlisted => serializer.serialize_bool(false),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum TagList {
    Tags(Vec<String>),
    Invalid(&'static str),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListToB64Payload<'a> {
    command: &'static str,
    input_list: &'a str,
    flag_version: i64,
    b64_string: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct B64ToListPayload<'a> {
    command: &'static str,
    input_b64: &'a str,
    list: TagList,
    #[serde(skip_serializing_if = "Option::is_none")]
    list_detail: Option<Entries<&'a TagInfo>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DomainListPayload<'a> {
    domain_name: &'a str,
    version: &'a str,
    list: Membership<Entries<&'a TagInfo>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DomainUintPayload<'a> {
    domain_name: &'a str,
    list: Membership<Vec<u16>>,
}

/// Descriptors for `tags`; tags without one are left out.
fn describe<'f, F>(filter: &'f F, tags: &[String]) -> Entries<&'f TagInfo>
where
    F: BlocklistFilter + ?Sized,
{
    tags.iter()
        .filter_map(|tag| filter.tag_info(tag).map(|info| (tag.clone(), info)))
        .collect()
}

fn membership<V, M>(hits: Option<Vec<DomainMatch>>, mut expand: M) -> Result<Membership<V>, CommandError>
where
    M: FnMut(DomainMatch) -> Result<V, CommandError>,
{
    let Some(hits) = hits else {
        return Ok(Membership::Unlisted);
    };

    let entries = hits
        .into_iter()
        .map(|hit| {
            let key = hit.key.clone();
            expand(hit).map(|value| (key, value))
        })
        .collect::<Result<_, _>>()?;
    Ok(Membership::Listed(entries))
}

/// `listtob64`: encode a comma separated tag list as a user flag.
pub fn list_to_b64<F>(query: &QueryParams, filter: &F) -> Result<HttpResponse, CommandError>
where
    F: BlocklistFilter + ?Sized,
{
    let list = query.get_or_empty("list");
    let flag_version = query
        .get("flagversion")
        .and_then(parse_leading_int)
        .unwrap_or(0);

    let tags: Vec<&str> = if list.is_empty() {
        Vec::new()
    } else {
        list.split(',').collect()
    };

    json_response(&ListToB64Payload {
        command: "List To B64String",
        input_list: list,
        flag_version,
        b64_string: filter.b64_flag_from_tags(&tags, flag_version)?,
    })
}

/// `b64tolist`: decode a user flag back into tag names and descriptors.
pub fn b64_to_list<F>(query: &QueryParams, filter: &F) -> Result<HttpResponse, CommandError>
where
    F: BlocklistFilter + ?Sized,
{
    let b64 = query.get_or_empty("b64");
    let decoded = filter.decode_b64_flag(b64)?;

    let (list, list_detail) = if decoded.is_valid_flag {
        let tags = filter.tags_for_flag(&decoded.user_blocklist_flag_uint)?;
        let detail = describe(filter, &tags);
        (TagList::Tags(tags), Some(detail))
    } else {
        (TagList::Invalid(INVALID_B64), None)
    };

    json_response(&B64ToListPayload {
        command: "Base64 To List",
        input_b64: b64,
        list,
        list_detail,
    })
}

/// `dntolist`: which lists contain a domain, expanded to tag descriptors.
pub fn domain_name_to_list<F>(
    query: &QueryParams,
    filter: &F,
    latest_timestamp: &str,
) -> Result<HttpResponse, CommandError>
where
    F: BlocklistFilter + ?Sized,
{
    let domain_name = query.get_or_empty("dn");
    let list = membership(filter.had_domain_name(domain_name)?, |hit| {
        let tags = filter.tags_for_flag(&hit.flag)?;
        Ok(describe(filter, &tags))
    })?;

    json_response(&DomainListPayload {
        domain_name,
        version: latest_timestamp,
        list,
    })
}

/// `dntouint`: which lists contain a domain, as raw flag words.
pub fn domain_name_to_uint<F>(query: &QueryParams, filter: &F) -> Result<HttpResponse, CommandError>
where
    F: BlocklistFilter + ?Sized,
{
    let domain_name = query.get_or_empty("dn");
    let list = membership(filter.had_domain_name(domain_name)?, |hit| Ok(hit.flag))?;

    json_response(&DomainUintPayload { domain_name, list })
}

/// `config` / `configure`: redirect to the configuration UI.
pub fn config_redirect(
    configure_url: &str,
    b64_user_flag: &str,
    origin: &str,
    latest_timestamp: &str,
) -> Result<HttpResponse, CommandError> {
    redirect(&format!(
        "{configure_url}?v=ext&u={origin}&tstamp={latest_timestamp}#{b64_user_flag}"
    ))
}
