use std::sync::Arc;

use camino::Utf8Path;
use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::domain::{Package, SearchTerm};
use crate::download::{DownloadOptions, Downloader};
use crate::error::TrawlError;
use crate::registry::RegistryClient;
use crate::report::SummaryReport;
use crate::search::{SearchOptions, Searcher};
use crate::store::DownloadStore;

#[derive(Debug, Clone, Serialize)]
pub struct PackageRow {
    pub id: String,
    pub version: String,
    pub description: Option<String>,
    pub authors: Option<String>,
    pub total_downloads: Option<u64>,
    pub verified: Option<bool>,
    pub download_url: String,
    pub local_path: Option<String>,
}

impl PackageRow {
    fn new(package: &Package, download_url: String) -> Self {
        Self {
            id: package.id.as_str().to_string(),
            version: package.version.clone(),
            description: package.description.clone(),
            authors: package.authors.as_ref().map(|authors| authors.to_string()),
            total_downloads: package.total_downloads,
            verified: package.verified,
            download_url,
            local_path: package
                .local_filepath
                .as_ref()
                .map(|path| path.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub terms: Vec<String>,
    pub total: usize,
    pub packages: Vec<PackageRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub terms: Vec<String>,
    pub discovered: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub store_root: String,
    pub items: Vec<PackageRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportResult {
    pub report_path: String,
    pub discovered: usize,
    pub downloaded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub store_root: String,
    pub archives: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub store_root: String,
    pub cleared: bool,
}

pub struct App<C> {
    searcher: Searcher<C>,
    downloader: Downloader<C>,
    store: DownloadStore,
}

impl<C: RegistryClient + 'static> App<C> {
    pub fn new(client: Arc<C>, store: DownloadStore, config: &ResolvedConfig) -> Self {
        let searcher = Searcher::new(
            Arc::clone(&client),
            SearchOptions {
                base_url: config.search_base_url.clone(),
                page_size: config.page_size,
                max_retries: config.max_retries,
                concurrency: config.query_concurrency,
                strict: config.strict,
            },
        );
        let downloader = Downloader::new(
            client,
            store.clone(),
            DownloadOptions {
                blob_base_url: config.blob_base_url.clone(),
                concurrency: config.download_concurrency,
            },
        );
        Self {
            searcher,
            downloader,
            store,
        }
    }

    pub async fn search(
        &self,
        terms: &[SearchTerm],
        ignore: &[String],
    ) -> Result<SearchResult, TrawlError> {
        let packages = self.searcher.search(terms, ignore).await?;
        let rows = self.rows_for(&packages);
        Ok(SearchResult {
            terms: term_strings(terms),
            total: rows.len(),
            packages: rows,
        })
    }

    pub async fn fetch(
        &self,
        terms: &[SearchTerm],
        ignore: &[String],
    ) -> Result<FetchResult, TrawlError> {
        let found = self.searcher.search(terms, ignore).await?;
        let discovered = found.len();
        let finished = self.downloader.download_all(found).await?;
        let downloaded = finished
            .iter()
            .filter(|package| package.local_filepath.is_some())
            .count();
        let failed = finished.len() - downloaded;
        let items = self.rows_for(&finished);
        Ok(FetchResult {
            terms: term_strings(terms),
            discovered,
            downloaded,
            failed,
            store_root: self.store.root().to_string(),
            items,
        })
    }

    pub async fn report(
        &self,
        terms: &[SearchTerm],
        ignore: &[String],
        out: &Utf8Path,
    ) -> Result<ReportResult, TrawlError> {
        let fetch = self.fetch(terms, ignore).await?;
        let report = SummaryReport::from_fetch(&fetch);
        DownloadStore::write_json_atomic(out, &report)?;
        Ok(ReportResult {
            report_path: out.to_string(),
            discovered: fetch.discovered,
            downloaded: fetch.downloaded,
            failed: fetch.failed,
        })
    }

    pub fn list(&self) -> Result<ListResult, TrawlError> {
        let archives = self
            .store
            .list()?
            .into_iter()
            .map(|path| path.to_string())
            .collect();
        Ok(ListResult {
            store_root: self.store.root().to_string(),
            archives,
        })
    }

    pub fn clear(&self) -> Result<ClearResult, TrawlError> {
        self.store.clear()?;
        Ok(ClearResult {
            store_root: self.store.root().to_string(),
            cleared: true,
        })
    }

    fn rows_for(&self, packages: &[Package]) -> Vec<PackageRow> {
        packages
            .iter()
            .map(|package| PackageRow::new(package, self.downloader.download_url_for(package)))
            .collect()
    }
}

fn term_strings(terms: &[SearchTerm]) -> Vec<String> {
    terms.iter().map(|term| term.as_str().to_string()).collect()
}
