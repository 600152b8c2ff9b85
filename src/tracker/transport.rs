//! Tracker HTTP transport
//!
//! The tracker client only needs "send GET, receive bytes"; this trait is
//! that seam.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

/// Performs a GET request and returns the response body
#[async_trait]
pub trait TrackerTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Vec<u8>>;
}

#[cfg(feature = "http")]
pub use reqwest_transport::HttpTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::Client;
    use tracing::{debug, error, warn};
    use url::Url;

    use super::TrackerTransport;
    use crate::error::{Result, TorrentError};

    /// `reqwest`-backed transport
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        pub fn new(timeout: Duration) -> Result<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| TorrentError::tracker_unreachable_with_source("failed to build HTTP client", e.to_string()))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl TrackerTransport for HttpTransport {
        async fn get(&self, url: &Url) -> Result<Vec<u8>> {
            debug!("GET {}", url);
            let response = self.client.get(url.clone()).send().await.map_err(|e| map_error(url, e))?;

            let status = response.status();
            if !status.is_success() {
                warn!("Tracker responded with HTTP {}", status);
                return Err(TorrentError::tracker_unreachable_with_source(
                    url.as_str(),
                    format!("HTTP status {}", status),
                ));
            }

            let body = response.bytes().await.map_err(|e| map_error(url, e))?;
            debug!("Tracker response: {} bytes", body.len());
            Ok(body.to_vec())
        }
    }

    fn map_error(url: &Url, err: reqwest::Error) -> TorrentError {
        if err.is_timeout() {
            warn!("Tracker request to {} timed out", url);
            TorrentError::timeout("tracker request")
        } else {
            error!("Tracker request to {} failed: {}", url, err);
            TorrentError::tracker_unreachable_with_source(url.as_str(), err.to_string())
        }
    }
}
