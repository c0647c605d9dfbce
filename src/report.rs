use serde::Serialize;

use crate::app::{FetchResult, PackageRow};

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub tool: String,
    pub generated_at: String,
    pub search_terms: Vec<String>,
    pub discovered: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub packages: Vec<PackageRow>,
}

impl SummaryReport {
    pub fn from_fetch(fetch: &FetchResult) -> Self {
        Self {
            tool: format!("nupkg-trawler/{}", env!("CARGO_PKG_VERSION")),
            generated_at: iso_timestamp(),
            search_terms: fetch.terms.clone(),
            discovered: fetch.discovered,
            downloaded: fetch.downloaded,
            failed: fetch.failed,
            packages: fetch.items.clone(),
        }
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
