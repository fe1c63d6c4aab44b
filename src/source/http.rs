//! HTTP asset source backed by reqwest

use super::{AssetSource, FetchError, FetchMode};
use bytes::Bytes;

/// Asset source fetching over HTTP(S)
///
/// Relative URLs are joined onto `base_url`.
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    /// Create a source resolving relative URLs against `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| FetchError::Transport {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    fn resolve(&self, url: &str) -> String {
        if url.contains("://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }
}

#[async_trait::async_trait]
impl AssetSource for HttpSource {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Bytes, FetchError> {
        let full = self.resolve(url);
        let mut request = self.client.get(&full);
        if mode == FetchMode::Reload {
            request = request
                .header(reqwest::header::CACHE_CONTROL, "no-cache")
                .header(reqwest::header::PRAGMA, "no-cache");
        }

        let response = request.send().await.map_err(|e| FetchError::Transport {
            url: full.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(full));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: full,
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| FetchError::Transport {
            url: full,
            reason: e.to_string(),
        })
    }

    fn source_name(&self) -> &'static str {
        "Http"
    }
}
