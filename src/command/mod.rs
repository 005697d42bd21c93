//! Control command dispatch.
//!
//! Requests reaching the service are either control commands, answered here,
//! or DNS queries that must continue to resolution. [`CommandControl`] tells
//! them apart from the request URL:
//!
//! | Path                 | Query                   | Result                          |
//! |----------------------|-------------------------|---------------------------------|
//! | `/listtob64`         | `list`, `flagversion`   | tag list encoded as a user flag |
//! | `/b64tolist`         | `b64`                   | user flag decoded to tags       |
//! | `/dntolist`          | `dn`                    | lists containing a domain       |
//! | `/dntouint`          | `dn`                    | same, as raw flag words         |
//! | `/config[/<flag>]`   |                         | `302` to the configuration UI   |
//! | anything else        | `dns`                   | pass-through                    |
//! | anything else        |                         | `"bad request"`                 |
//!
//! # Example
//!
//! ```
//! use blocklist_control::command::CommandControl;
//! use blocklist_control::filter::InMemoryFilter;
//!
//! let control = CommandControl::new("1667000000000");
//! let filter = InMemoryFilter::default();
//!
//! let envelope = control.handle("GET", "https://dns.test/dns-query?dns=AAAB", &filter);
//! assert!(!envelope.data.stop_processing);
//!
//! let envelope = control.handle("GET", "https://dns.test/config/1:AAA", &filter);
//! assert_eq!(envelope.http_response().unwrap().status(), 302);
//! ```

pub mod envelope;
pub mod handlers;
pub mod query;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, instrument, warn};
use url::Url;

pub use envelope::{EXCEPTION_FROM, HttpResponse, ResponseData, ResponseEnvelope};
pub use query::QueryParams;

use crate::error::CommandError;
use crate::filter::BlocklistFilter;
use envelope::{error_trace, json_response};

/// Default target of the configuration redirect.
pub const DEFAULT_CONFIGURE_URL: &str = "https://rethinkdns.com/configure";

/// Body returned for requests that are neither a command nor a DNS query.
const BAD_REQUEST: &str = "bad request";

/// The recognized command tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ListToB64,
    B64ToList,
    DomainNameToList,
    DomainNameToUint,
    Configure,
}

impl Command {
    /// Match a path segment, case-sensitively.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "listtob64" => Some(Self::ListToB64),
            "b64tolist" => Some(Self::B64ToList),
            "dntolist" => Some(Self::DomainNameToList),
            "dntouint" => Some(Self::DomainNameToUint),
            "config" | "configure" => Some(Self::Configure),
            _ => None,
        }
    }
}

/// Entry point of the command layer.
///
/// Holds only immutable settings, so one instance can serve concurrent
/// requests. The filter is borrowed per call.
#[derive(Debug, Clone)]
pub struct CommandControl {
    latest_timestamp: String,
    configure_url: String,
}

impl CommandControl {
    /// Create a command layer reporting `latest_timestamp` as the blocklist
    /// version.
    pub fn new(latest_timestamp: impl Into<String>) -> Self {
        Self {
            latest_timestamp: latest_timestamp.into(),
            configure_url: DEFAULT_CONFIGURE_URL.to_string(),
        }
    }

    /// Redirect `config` commands to `configure_url` instead of the default.
    #[must_use]
    pub fn with_configure_url(mut self, configure_url: impl Into<String>) -> Self {
        self.configure_url = configure_url.into();
        self
    }

    pub fn latest_timestamp(&self) -> &str {
        &self.latest_timestamp
    }

    pub fn configure_url(&self) -> &str {
        &self.configure_url
    }

    /// Handle a request.
    ///
    /// Only `GET` requests can carry commands; anything else (such as a
    /// DNS-over-HTTPS `POST`) passes through untouched.
    pub fn handle<F>(&self, method: &str, url: &str, filter: &F) -> ResponseEnvelope
    where
        F: BlocklistFilter + ?Sized,
    {
        if method.eq_ignore_ascii_case("GET") {
            self.dispatch(url, filter)
        } else {
            debug!(method, "not a command method, passing through");
            ResponseEnvelope::pass_through()
        }
    }

    /// Route `url` to its command.
    ///
    /// Never fails: URL parse errors, filter errors and panics raised while
    /// running a command all come back as an exception envelope.
    #[instrument(skip(self, filter), fields(command))]
    pub fn dispatch<F>(&self, url: &str, filter: &F) -> ResponseEnvelope
    where
        F: BlocklistFilter + ?Sized,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(url, filter)))
            .unwrap_or_else(|payload| Err(CommandError::Panicked(panic_message(&*payload))));

        match outcome {
            Ok(Some(response)) => ResponseEnvelope::handled(response),
            Ok(None) => ResponseEnvelope::pass_through(),
            Err(err) => {
                let trace = error_trace(&err);
                warn!(error = %trace, "command failed");
                ResponseEnvelope::exception(trace)
            }
        }
    }

    /// Run the command named by `url`; `None` means pass-through.
    fn run<F>(&self, url: &str, filter: &F) -> Result<Option<HttpResponse>, CommandError>
    where
        F: BlocklistFilter + ?Sized,
    {
        let url = Url::parse(url)?;
        let query = QueryParams::from_url(&url);
        let segments: Vec<&str> = url.path().split('/').collect();
        let token = segments.get(1).copied().unwrap_or_default();
        tracing::Span::current().record("command", token);

        let response = match Command::from_token(token) {
            Some(Command::ListToB64) => handlers::list_to_b64(&query, filter)?,
            Some(Command::B64ToList) => handlers::b64_to_list(&query, filter)?,
            Some(Command::DomainNameToList) => {
                handlers::domain_name_to_list(&query, filter, &self.latest_timestamp)?
            }
            Some(Command::DomainNameToUint) => handlers::domain_name_to_uint(&query, filter)?,
            Some(Command::Configure) => handlers::config_redirect(
                &self.configure_url,
                segments.get(2).copied().unwrap_or_default(),
                &url.origin().ascii_serialization(),
                &self.latest_timestamp,
            )?,
            None if query.has("dns") => {
                debug!("dns query, passing through");
                return Ok(None);
            }
            None => {
                debug!("unrecognized command");
                json_response(BAD_REQUEST)?
            }
        };
        Ok(Some(response))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{InMemoryFilter, TagInfo};

    const TIMESTAMP: &str = "1667000000000";

    fn control() -> CommandControl {
        CommandControl::new(TIMESTAMP)
    }

    fn filter() -> InMemoryFilter {
        InMemoryFilter::new([TagInfo::new(0, "ADS", "Ad servers")])
            .unwrap()
            .with_domain("ads.example.com", ["ADS"])
            .unwrap()
    }

    fn body(envelope: &ResponseEnvelope) -> &str {
        envelope.http_response().unwrap().body()
    }

    #[test]
    fn should_match_command_tokens_exactly() {
        assert_eq!(Command::from_token("listtob64"), Some(Command::ListToB64));
        assert_eq!(Command::from_token("config"), Some(Command::Configure));
        assert_eq!(Command::from_token("configure"), Some(Command::Configure));
        assert_eq!(Command::from_token("ListToB64"), None);
        assert_eq!(Command::from_token(""), None);
    }

    #[test]
    fn should_pass_through_non_get_requests() {
        let envelope = control().handle("POST", "https://h.test/listtob64?list=ADS", &filter());

        assert!(!envelope.is_exception);
        assert!(!envelope.data.stop_processing);
        assert!(envelope.http_response().is_none());
    }

    #[test]
    fn should_accept_lowercase_get() {
        let envelope = control().handle("get", "https://h.test/dntouint?dn=x.com", &filter());
        assert!(envelope.data.stop_processing);
    }

    #[test]
    fn should_pass_through_dns_queries() {
        let envelope = control().dispatch("https://h.test/dns-query?dns=AAABAAAB", &filter());

        assert!(!envelope.is_exception);
        assert!(!envelope.data.stop_processing);
        assert!(envelope.http_response().is_none());
    }

    #[test]
    fn should_prefer_commands_over_dns_parameter() {
        let envelope = control().dispatch("https://h.test/dntouint?dn=x.com&dns=AA", &filter());
        assert!(envelope.data.stop_processing);
    }

    #[test]
    fn should_reject_unknown_paths() {
        let envelope = control().dispatch("https://h.test/whatever?x=1", &filter());

        assert!(!envelope.is_exception);
        assert!(envelope.data.stop_processing);
        assert_eq!(body(&envelope), "\"bad request\"");
        assert_eq!(envelope.http_response().unwrap().status(), http::StatusCode::OK);
    }

    #[test]
    fn should_reject_root_path() {
        let envelope = control().dispatch("https://h.test/", &filter());
        assert_eq!(body(&envelope), "\"bad request\"");
    }

    #[test]
    fn should_redirect_config_without_flag() {
        let envelope = control().dispatch("https://h.test/configure", &filter());

        let response = envelope.http_response().unwrap();
        assert_eq!(response.status(), http::StatusCode::FOUND);
        assert_eq!(
            response.headers()[http::header::LOCATION],
            "https://rethinkdns.com/configure?v=ext&u=https://h.test&tstamp=1667000000000#"
        );
    }

    #[test]
    fn should_use_only_second_segment_as_flag() {
        let envelope = control()
            .with_configure_url("https://ui.test/setup")
            .dispatch("https://h.test:8443/config/1:gAB/extra", &filter());

        assert_eq!(
            envelope.http_response().unwrap().headers()[http::header::LOCATION],
            "https://ui.test/setup?v=ext&u=https://h.test:8443&tstamp=1667000000000#1:gAB"
        );
    }

    #[test]
    fn should_convert_url_errors_into_exception() {
        let envelope = control().dispatch("not a url", &filter());

        assert!(envelope.is_exception);
        assert!(envelope.data.stop_processing);
        assert_eq!(envelope.exception_from, EXCEPTION_FROM);
        assert!(envelope.exception_stack.starts_with("invalid request url"));

        let body: String = serde_json::from_str(body(&envelope)).unwrap();
        assert_eq!(body, envelope.exception_stack);
    }

    #[test]
    fn should_convert_filter_errors_into_exception() {
        let envelope = control().dispatch("https://h.test/listtob64?list=NOPE", &filter());

        assert!(envelope.is_exception);
        assert!(envelope.exception_stack.contains("unknown blocklist tag: \"NOPE\""));
    }
}
