use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::SearchTerm;
use crate::error::TrawlError;

pub const DEFAULT_SEARCH_BASE_URL: &str = "https://azuresearch-usnc.nuget.org/query";
pub const DEFAULT_BLOB_BASE_URL: &str = "https://api.nuget.org/v3-flatcontainer";
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub query_concurrency: Option<usize>,
    #[serde(default)]
    pub download_concurrency: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub search_base_url: Option<String>,
    #[serde(default)]
    pub blob_base_url: Option<String>,
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default)]
    pub strict: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub search_terms: Vec<SearchTerm>,
    pub ignore: Vec<String>,
    pub page_size: u32,
    pub query_concurrency: usize,
    pub download_concurrency: usize,
    pub max_retries: u32,
    pub search_base_url: String,
    pub blob_base_url: String,
    pub download_dir: Option<Utf8PathBuf>,
    pub strict: bool,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `nupkg-trawler.json` from the working directory, or the given
    /// path. Without an explicit path a missing file is not an error: the
    /// command line can supply everything the file would have.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, TrawlError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("nupkg-trawler.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| TrawlError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| TrawlError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, TrawlError> {
        let search_terms = config
            .search_terms
            .into_iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<SearchTerm>, TrawlError>>()?;

        Ok(ResolvedConfig {
            search_terms,
            ignore: config.ignore,
            page_size: config.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            query_concurrency: config.query_concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            download_concurrency: config.download_concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            max_retries: config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            search_base_url: config
                .search_base_url
                .unwrap_or_else(|| DEFAULT_SEARCH_BASE_URL.to_string()),
            blob_base_url: config
                .blob_base_url
                .unwrap_or_else(|| DEFAULT_BLOB_BASE_URL.to_string()),
            download_dir: config.download_dir.map(Utf8PathBuf::from),
            strict: config.strict.unwrap_or(false),
        })
    }
}
