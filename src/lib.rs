//! Blocklist control - the command layer of a DNS blocklist service.
//!
//! Requests arriving at the service are either control commands or DNS
//! queries. This crate answers the commands (encoding and decoding user
//! blocklist flags, looking up which lists carry a domain, redirecting to the
//! configuration UI) and tells the caller to keep processing everything else.
//!
//! # Architecture
//!
//! - [`command`]: URL dispatch, command handlers and the response envelope
//! - [`filter`]: the [`BlocklistFilter`](filter::BlocklistFilter) the commands
//!   query, plus an in-memory implementation and its data loader
//! - [`config`]: Configuration loading and timestamp resolution
//! - [`error`]: Error types
//!
//! ```rust
//! use blocklist_control::command::CommandControl;
//! use blocklist_control::filter::{InMemoryFilter, TagInfo};
//!
//! let filter = InMemoryFilter::new([TagInfo::new(0, "ADS", "Ad servers")])
//!     .unwrap()
//!     .with_domain("ads.example.com", ["ADS"])
//!     .unwrap();
//! let control = CommandControl::new("1667000000000");
//!
//! let envelope = control.handle("GET", "https://dns.test/dntouint?dn=ads.example.com", &filter);
//! let body = envelope.http_response().unwrap().body();
//! assert_eq!(body, r#"{"domainName":"ads.example.com","list":{"ads.example.com":[32768,32768]}}"#);
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod filter;

pub use command::{CommandControl, ResponseEnvelope};
pub use config::Config;
pub use error::{Error, Result};
