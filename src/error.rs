use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TrawlError {
    #[error("invalid package id: {0}")]
    InvalidPackageId(String),

    #[error("invalid search term: {0}")]
    InvalidSearchTerm(String),

    #[error("no search terms given on the command line or in nupkg-trawler.json")]
    NoSearchTerms,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("registry request failed: {0}")]
    RegistryHttp(String),

    #[error("registry returned status {status}: {message}")]
    RegistryStatus { status: u16, message: String },

    #[error("failed to parse search response: {0}")]
    SearchParse(String),

    #[error("query failed after {attempts} attempts: {query}")]
    QueryFailed { query: String, attempts: u32 },

    #[error("worker task failed: {0}")]
    Worker(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
