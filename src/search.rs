use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::domain::{Package, SearchTerm};
use crate::error::TrawlError;
use crate::registry::RegistryClient;

/// Upper bound on the queries planned for one term; a registry reporting a
/// runaway hit count gets its plan truncated here.
const MAX_PLANNED_QUERIES: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub total_hits: u64,
    #[serde(default)]
    pub data: Vec<Package>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub base_url: String,
    pub page_size: u32,
    pub max_retries: u32,
    pub concurrency: usize,
    pub strict: bool,
}

pub struct Searcher<C> {
    client: Arc<C>,
    base_url: String,
    page_size: u32,
    max_retries: u32,
    concurrency: usize,
    strict: bool,
}

impl<C> Clone for Searcher<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            base_url: self.base_url.clone(),
            page_size: self.page_size,
            max_retries: self.max_retries,
            concurrency: self.concurrency,
            strict: self.strict,
        }
    }
}

impl<C: RegistryClient + 'static> Searcher<C> {
    pub fn new(client: Arc<C>, options: SearchOptions) -> Self {
        Self {
            client,
            base_url: options.base_url,
            page_size: options.page_size.max(1),
            max_retries: options.max_retries.max(1),
            concurrency: options.concurrency.max(1),
            strict: options.strict,
        }
    }

    /// Runs a `take=1` probe to learn the term's total hit count, then lays
    /// out the paginated query strings needed to cover it.
    pub async fn plan_queries(&self, term: &SearchTerm) -> Result<Vec<String>, TrawlError> {
        let probe = format!("?q={}&take=1", term.as_str());
        let initial = self.execute_query(&probe).await?;
        debug!(term = %term, total_hits = initial.total_hits, "planned term pagination");
        let queries = plan_query_strings(term.as_str(), self.page_size, initial.total_hits);
        let covered = queries.len() as u64 * u64::from(self.page_size);
        if covered < initial.total_hits {
            warn!(
                term = %term,
                total_hits = initial.total_hits,
                planned = queries.len(),
                "hit count exceeds the planning cap, fetching the first pages only"
            );
        }
        Ok(queries)
    }

    /// Executes one search query, reattempting immediately on network or
    /// parse failure until the attempt budget is spent.
    pub async fn execute_query(&self, query: &str) -> Result<SearchPage, TrawlError> {
        let url = format!("{}{}", self.base_url, query);
        let mut attempt = 0u32;
        while attempt < self.max_retries {
            attempt += 1;
            match self.fetch_page(&url).await {
                Ok(page) => return Ok(page),
                Err(err) => {
                    warn!(
                        error = %err,
                        attempt,
                        max_retries = self.max_retries,
                        query,
                        "query attempt failed"
                    );
                }
            }
        }
        Err(TrawlError::QueryFailed {
            query: query.to_string(),
            attempts: self.max_retries,
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<SearchPage, TrawlError> {
        let body = self.client.get_text(url).await?;
        serde_json::from_str(&body).map_err(|err| TrawlError::SearchParse(err.to_string()))
    }

    /// Plans and executes every query for a single term. Packages come back
    /// in pipeline completion order, without cross-term deduplication.
    pub async fn search_term(&self, term: &SearchTerm) -> Result<Vec<Package>, TrawlError> {
        let queries = self.plan_queries(term).await?;
        self.run_queries(queries).await
    }

    /// Searches every term and merges the results, keeping the first package
    /// seen for each lower-cased identifier and dropping ignored ones. A
    /// failed term is skipped with a warning unless strict mode is on.
    pub async fn search(
        &self,
        terms: &[SearchTerm],
        ignore: &[String],
    ) -> Result<Vec<Package>, TrawlError> {
        let ignored: HashSet<String> = ignore.iter().map(|name| name.to_lowercase()).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut packages: Vec<Package> = Vec::new();

        for term in terms {
            info!(term = %term, "searching registry");
            let found = match self.search_term(term).await {
                Ok(found) => found,
                Err(err) => {
                    if self.strict {
                        return Err(err);
                    }
                    warn!(error = %err, term = %term, "term failed, skipping");
                    continue;
                }
            };
            for package in found {
                let key = package.id.normalized();
                if ignored.contains(&key) || !seen.insert(key) {
                    continue;
                }
                packages.push(package);
            }
        }
        Ok(packages)
    }

    /// Fans the planned queries out to a fixed pool of workers over a bounded
    /// channel. Each worker drains queries until the channel closes and hands
    /// its batch back through its join handle; the batches are merged
    /// sequentially afterwards.
    async fn run_queries(&self, queries: Vec<String>) -> Result<Vec<Package>, TrawlError> {
        let (tx, rx) = mpsc::channel::<String>(self.concurrency);
        let rx = Arc::new(Mutex::new(rx));
        let processed = Arc::new(Mutex::new(HashSet::new()));

        let mut workers = Vec::new();
        for _ in 0..self.concurrency {
            let searcher = self.clone();
            let rx = Arc::clone(&rx);
            let processed = Arc::clone(&processed);
            workers.push(tokio::spawn(async move {
                let mut batch: Vec<Package> = Vec::new();
                loop {
                    let next = { rx.lock().await.recv().await };
                    let Some(query) = next else { break };
                    {
                        let mut seen = processed.lock().await;
                        if !seen.insert(query.clone()) {
                            debug!(query, "skipping already processed query");
                            continue;
                        }
                    }
                    let page = searcher.execute_query(&query).await?;
                    batch.extend(page.data);
                }
                Ok::<Vec<Package>, TrawlError>(batch)
            }));
        }

        for query in queries {
            // Send fails only once every worker has exited and dropped the
            // receiver; remaining queries have nobody left to run them.
            if tx.send(query).await.is_err() {
                break;
            }
        }
        drop(tx);

        let mut packages = Vec::new();
        for outcome in join_all(workers).await {
            let batch = outcome.map_err(|err| TrawlError::Worker(err.to_string()))??;
            packages.extend(batch);
        }
        Ok(packages)
    }
}

fn plan_query_strings(term: &str, page_size: u32, total_hits: u64) -> Vec<String> {
    let mut queries = Vec::new();
    let mut offset = 0u64;
    // Always runs once, so a term with zero hits still gets its offset-0 query.
    loop {
        queries.push(format!("?q={term}&take={page_size}&skip={offset}"));
        offset += u64::from(page_size);
        if offset >= total_hits || queries.len() >= MAX_PLANNED_QUERIES {
            break;
        }
    }
    queries
}
