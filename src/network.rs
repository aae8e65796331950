//! Network transport
//!
//! The worker only sees the `Network` trait: hand it a request, get back a
//! response or a `PrecacheError::Network`. Any HTTP status, including 4xx
//! and 5xx, is a successful fetch; only transport failures (DNS, connect,
//! TLS, timeout, oversized body) are errors.

use crate::config::schema::NetworkConfig;
use crate::error::{PrecacheError, PrecacheResult};
use crate::http::{Headers, Method, Request, Response};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::{Agent, RequestBuilder};

/// Abstract network interface
#[async_trait]
pub trait Network: Send + Sync {
    /// Send a request to its origin server
    async fn fetch(&self, request: &Request) -> PrecacheResult<Response>;
}

/// HTTP(S) transport backed by a `ureq` agent
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    agent: Agent,
    user_agent: String,
    max_body_bytes: u64,
}

impl HttpNetwork {
    pub fn new(config: &NetworkConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            user_agent: config.user_agent.clone(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Blocking send; run on the blocking pool
    fn send(&self, request: &Request) -> Result<Response, ureq::Error> {
        let url = request.url.as_str();
        let body = request.body.as_deref().unwrap_or_default();

        let mut response = match request.method {
            Method::Get => self.prepare(self.agent.get(url), request).call()?,
            Method::Head => self.prepare(self.agent.head(url), request).call()?,
            Method::Delete => self.prepare(self.agent.delete(url), request).call()?,
            Method::Options => self.prepare(self.agent.options(url), request).call()?,
            Method::Post => self.prepare(self.agent.post(url), request).send(body)?,
            Method::Put => self.prepare(self.agent.put(url), request).send(body)?,
            Method::Patch => self.prepare(self.agent.patch(url), request).send(body)?,
        };

        let status = response.status();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let body = if request.method == Method::Head {
            Vec::new()
        } else {
            response
                .body_mut()
                .with_config()
                .limit(self.max_body_bytes)
                .read_to_vec()?
        };

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }

    fn prepare<B>(&self, builder: RequestBuilder<B>, request: &Request) -> RequestBuilder<B> {
        let mut builder = builder.header("User-Agent", self.user_agent.as_str());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        builder
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> PrecacheResult<Response> {
        debug!("Network fetch: {} {}", request.method, request.url);

        let network = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || network.send(&request))
            .await
            .map_err(|e| PrecacheError::Internal(format!("network task failed: {}", e)))?
            .map_err(|e| PrecacheError::Network(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let config = NetworkConfig {
            timeout_secs: 2,
            ..NetworkConfig::default()
        };
        let network = HttpNetwork::new(&config);

        // Port 9 on the loopback interface (discard) is closed on test machines
        let request = Request::parse("http://127.0.0.1:9/index.html").unwrap();
        let err = network.fetch(&request).await.unwrap_err();
        assert!(matches!(err, PrecacheError::Network(_)));
    }
}
