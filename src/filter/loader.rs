//! Loads an [`InMemoryFilter`] from a JSON data file.
//!
//! The file holds the tag table keyed by tag name and the domain index keyed
//! by domain name:
//!
//! ```json
//! {
//!   "tags": {
//!     "ADS": { "value": 0, "vname": "Ad servers", "group": "privacy" }
//!   },
//!   "domains": {
//!     "ads.example.com": ["ADS"]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::{FilterError, InMemoryFilter, TagInfo};

/// Error type for filter data loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// File was not found at the specified path.
    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    /// Permission denied when accessing the file.
    #[error("permission denied: {0:?}")]
    PermissionDenied(PathBuf),

    /// I/O error while reading the file.
    #[error("I/O error reading {path:?}")]
    Io {
        /// Path to the file that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid filter JSON.
    #[error("invalid filter data")]
    Parse(#[from] serde_json::Error),

    /// The data is well-formed but inconsistent.
    #[error("inconsistent filter data")]
    Filter(#[from] FilterError),

    /// Task join error from spawning a blocking task.
    #[error("task join error")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterData {
    #[serde(default)]
    tags: BTreeMap<String, TagInfo>,
    #[serde(default)]
    domains: BTreeMap<String, Vec<String>>,
}

/// Loads filter data files.
pub struct FilterLoader;

impl FilterLoader {
    /// Load filter data from a JSON file.
    ///
    /// The file is read asynchronously and parsed in a blocking task, since
    /// domain indexes can be large.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the file cannot be read, is not valid JSON,
    /// or references tags missing from its own tag table.
    pub async fn load(path: &Path) -> Result<InMemoryFilter, LoadError> {
        let path_buf = path.to_path_buf();

        let mut file = File::open(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(path_buf.clone()),
            std::io::ErrorKind::PermissionDenied => LoadError::PermissionDenied(path_buf.clone()),
            _ => LoadError::Io {
                path: path_buf.clone(),
                source: e,
            },
        })?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .await
            .map_err(|e| LoadError::Io {
                path: path_buf.clone(),
                source: e,
            })?;

        let filter = tokio::task::spawn_blocking(move || Self::parse(&content)).await??;
        debug!(
            path = %path_buf.display(),
            tags = filter.tag_count(),
            domains = filter.domain_count(),
            "filter data loaded"
        );
        Ok(filter)
    }

    /// Parse filter data from a JSON string.
    ///
    /// A tag's `uname` defaults to its key in the tag table.
    pub fn parse(content: &str) -> Result<InMemoryFilter, LoadError> {
        let data: FilterData = serde_json::from_str(content)?;

        let tags = data.tags.into_iter().map(|(name, mut info)| {
            if info.uname.is_empty() {
                info.uname = name;
            }
            info
        });

        let mut filter = InMemoryFilter::new(tags)?;
        for (domain, tags) in &data.domains {
            filter.insert_domain(domain, tags)?;
        }
        Ok(filter)
    }
}
