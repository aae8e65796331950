//! Stored cache entries

use crate::error::{PrecacheError, PrecacheResult};
use crate::http::{Method, Request, RequestKey, Response};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Format bytes as human-readable size (e.g., "1.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// A response stored against a request identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub key: RequestKey,
    pub response: Response,
    /// Request header values recorded for each name in the response's `Vary`
    pub vary: BTreeMap<String, Option<String>>,
    pub stored_at: DateTime<Utc>,
}

impl CachedEntry {
    /// Snapshot a response for storage
    ///
    /// Fails for non-GET requests and for `Vary: *`, neither of which can
    /// ever be matched again.
    pub fn new(request: &Request, response: Response) -> PrecacheResult<Self> {
        if request.method != Method::Get {
            return Err(PrecacheError::storage(
                format!("storing {}", request.key()),
                "only GET requests can be cached",
            ));
        }

        let mut vary = BTreeMap::new();
        for name in response.vary() {
            if name == "*" {
                return Err(PrecacheError::storage(
                    format!("storing {}", request.key()),
                    "response has Vary: *",
                ));
            }
            let value = request.headers.get(&name).map(str::to_string);
            vary.insert(name, value);
        }

        Ok(Self {
            key: request.key(),
            response,
            vary,
            stored_at: Utc::now(),
        })
    }

    /// Whether this entry answers the given request
    pub fn matches(&self, request: &Request) -> bool {
        request.key() == self.key
            && self
                .vary
                .iter()
                .all(|(name, value)| request.headers.get(name) == value.as_deref())
    }

    pub fn size_bytes(&self) -> u64 {
        self.response.body.len() as u64
    }
}
