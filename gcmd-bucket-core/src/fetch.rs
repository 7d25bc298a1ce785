//! HTTP implementation of [`Fetcher`] on top of `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, error};

use crate::contract::{FetchError, Fetcher};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("gcmd-bucket/", env!("CARGO_PKG_VERSION"));

/// Fetches catalog resources over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        debug!(url, "Sending HTTP GET request");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!(url, error = %e, "HTTP request failed");
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!(url, status = status.as_u16(), "HTTP request returned error status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        match response.bytes().await {
            Ok(body) => {
                debug!(url, bytes = body.len(), "HTTP GET succeeded");
                Ok(body)
            }
            Err(e) => {
                error!(url, error = %e, "Failed to read HTTP response body");
                Err(FetchError::Transport {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
