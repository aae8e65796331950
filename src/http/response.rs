//! Response snapshot

use crate::http::Headers;

/// An HTTP response: status line, headers, and a fully buffered body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Empty `503 Offline` response returned when the network is unreachable
    pub fn offline() -> Self {
        Self::new(503, "Offline", Vec::new())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Whether the status is in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Lowercased header names listed in `Vary`
    pub fn vary(&self) -> Vec<String> {
        self.headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("vary"))
            .flat_map(|(_, value)| value.split(','))
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect()
    }
}
