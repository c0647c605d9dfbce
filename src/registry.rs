use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::TrawlError;

#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, TrawlError>;
    async fn download_file(&self, url: &str, destination: &Path) -> Result<(), TrawlError>;
}

#[derive(Clone)]
pub struct HttpRegistryClient {
    client: Client,
}

impl HttpRegistryClient {
    pub fn new() -> Result<Self, TrawlError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("nupkg-trawler/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| TrawlError::RegistryHttp(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| TrawlError::RegistryHttp(err.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn get_text(&self, url: &str) -> Result<String, TrawlError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| TrawlError::RegistryHttp(err.to_string()))?;
        let response = fail_for_status(response).await?;
        response
            .text()
            .await
            .map_err(|err| TrawlError::RegistryHttp(err.to_string()))
    }

    async fn download_file(&self, url: &str, destination: &Path) -> Result<(), TrawlError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| TrawlError::RegistryHttp(err.to_string()))?;
        let response = fail_for_status(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TrawlError::RegistryHttp(err.to_string()))?;
        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|err| TrawlError::Filesystem(err.to_string()))
    }
}

async fn fail_for_status(response: reqwest::Response) -> Result<reqwest::Response, TrawlError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "registry request failed".to_string());
    Err(TrawlError::RegistryStatus { status, message })
}
