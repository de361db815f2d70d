// WHY: remote sources are one interchangeable seam; the pipeline only sees
// bytes or a ConvertError naming the URL and cause

use crate::config::FetchConfig;
use crate::error::{ConvertError, Result};
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, info};

/// Fetches the raw bytes behind a URL
pub trait SourceFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// reqwest-backed fetcher honoring the host's timeout, if any
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ConvertError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            debug!("Fetching {url}");
            let network = |e: reqwest::Error| ConvertError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            };

            let response = self.client.get(url).send().await.map_err(network)?;
            let status = response.status();
            if !status.is_success() {
                return Err(ConvertError::FetchStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let bytes = response.bytes().await.map_err(network)?;
            info!(bytes = bytes.len(), "Fetched {url}");
            Ok(bytes.to_vec())
        })
    }
}

/// File name implied by the last path segment of `url`
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let name = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(percent_decode(name))
}

/// Percent-decode a path segment; malformed escapes are kept verbatim
fn percent_decode(segment: &str) -> String {
    let decoded = urlencoding::decode_binary(segment.as_bytes());
    String::from_utf8_lossy(&decoded).into_owned()
}
