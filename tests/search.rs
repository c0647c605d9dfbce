use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use assert_matches::assert_matches;
use async_trait::async_trait;

use nupkg_trawler::domain::SearchTerm;
use nupkg_trawler::error::TrawlError;
use nupkg_trawler::registry::RegistryClient;
use nupkg_trawler::search::{SearchOptions, Searcher};

struct ScriptedRegistry {
    pages: HashMap<String, String>,
}

impl ScriptedRegistry {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn get_text(&self, url: &str) -> Result<String, TrawlError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| TrawlError::RegistryHttp(format!("no canned response for {url}")))
    }

    async fn download_file(&self, _url: &str, _destination: &Path) -> Result<(), TrawlError> {
        Err(TrawlError::RegistryHttp("not implemented".to_string()))
    }
}

#[derive(Default)]
struct FlakyRegistry {
    calls: AtomicU32,
    body: Option<String>,
}

#[async_trait]
impl RegistryClient for FlakyRegistry {
    async fn get_text(&self, _url: &str) -> Result<String, TrawlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.body {
            Some(body) => Ok(body.clone()),
            None => Err(TrawlError::RegistryHttp("connection reset".to_string())),
        }
    }

    async fn download_file(&self, _url: &str, _destination: &Path) -> Result<(), TrawlError> {
        Err(TrawlError::RegistryHttp("not implemented".to_string()))
    }
}

struct RecoveringRegistry {
    calls: AtomicU32,
    failures: u32,
    body: String,
}

#[async_trait]
impl RegistryClient for RecoveringRegistry {
    async fn get_text(&self, _url: &str) -> Result<String, TrawlError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(TrawlError::RegistryHttp("connection reset".to_string()));
        }
        Ok(self.body.clone())
    }

    async fn download_file(&self, _url: &str, _destination: &Path) -> Result<(), TrawlError> {
        Err(TrawlError::RegistryHttp("not implemented".to_string()))
    }
}

fn searcher<C: RegistryClient + 'static>(client: Arc<C>, strict: bool) -> Searcher<C> {
    Searcher::new(
        client,
        SearchOptions {
            base_url: "https://registry.test/query".to_string(),
            page_size: 20,
            max_retries: 3,
            concurrency: 2,
            strict,
        },
    )
}

fn terms(values: &[&str]) -> Vec<SearchTerm> {
    values.iter().map(|value| value.parse().unwrap()).collect()
}

#[tokio::test]
async fn executor_spends_exactly_three_attempts() {
    let client = Arc::new(FlakyRegistry::default());
    let searcher = searcher(Arc::clone(&client), false);

    let err = searcher.execute_query("?q=broken&take=1").await.unwrap_err();

    assert_matches!(
        err,
        TrawlError::QueryFailed { attempts: 3, ref query } if query == "?q=broken&take=1"
    );
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn executor_retries_unparseable_bodies() {
    let client = Arc::new(FlakyRegistry {
        calls: AtomicU32::new(0),
        body: Some("<html>gateway timeout</html>".to_string()),
    });
    let searcher = searcher(Arc::clone(&client), false);

    let err = searcher.execute_query("?q=garbled&take=1").await.unwrap_err();

    assert_matches!(err, TrawlError::QueryFailed { attempts: 3, .. });
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn executor_stops_after_first_success() {
    let client = Arc::new(RecoveringRegistry {
        calls: AtomicU32::new(0),
        failures: 1,
        body: r#"{"totalHits": 1, "data": [{"id": "Foo", "version": "1.0.0"}]}"#.to_string(),
    });
    let searcher = searcher(Arc::clone(&client), false);

    let page = searcher.execute_query("?q=foo&take=1").await.unwrap();

    assert_eq!(page.total_hits, 1);
    assert_eq!(page.data.len(), 1);
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn planner_paginates_from_probe_total() {
    let client = Arc::new(ScriptedRegistry::new(&[(
        "https://registry.test/query?q=template&take=1",
        r#"{"totalHits": 45, "data": [{"id": "First", "version": "1.0.0"}]}"#,
    )]));
    let searcher = searcher(client, false);

    let queries = searcher
        .plan_queries(&"template".parse().unwrap())
        .await
        .unwrap();

    assert_eq!(
        queries,
        vec![
            "?q=template&take=20&skip=0",
            "?q=template&take=20&skip=20",
            "?q=template&take=20&skip=40",
        ]
    );
}

#[tokio::test]
async fn planner_keeps_one_query_for_zero_hits() {
    let client = Arc::new(ScriptedRegistry::new(&[(
        "https://registry.test/query?q=nothing&take=1",
        r#"{"totalHits": 0, "data": []}"#,
    )]));
    let searcher = searcher(client, false);

    let queries = searcher
        .plan_queries(&"nothing".parse().unwrap())
        .await
        .unwrap();

    assert_eq!(queries, vec!["?q=nothing&take=20&skip=0"]);
}

#[tokio::test]
async fn multi_page_term_merges_every_page() {
    let client = Arc::new(ScriptedRegistry::new(&[
        (
            "https://registry.test/query?q=widgets&take=1",
            r#"{"totalHits": 5, "data": [{"id": "Widget.One", "version": "1.0.0"}]}"#,
        ),
        (
            "https://registry.test/query?q=widgets&take=2&skip=0",
            r#"{"totalHits": 5, "data": [
                {"id": "Widget.One", "version": "1.0.0"},
                {"id": "Widget.Two", "version": "1.0.0"}
            ]}"#,
        ),
        (
            "https://registry.test/query?q=widgets&take=2&skip=2",
            r#"{"totalHits": 5, "data": [
                {"id": "Widget.Three", "version": "1.0.0"},
                {"id": "Widget.Four", "version": "1.0.0"}
            ]}"#,
        ),
        (
            "https://registry.test/query?q=widgets&take=2&skip=4",
            r#"{"totalHits": 5, "data": [{"id": "Widget.Five", "version": "1.0.0"}]}"#,
        ),
    ]));
    let searcher = Searcher::new(
        client,
        SearchOptions {
            base_url: "https://registry.test/query".to_string(),
            page_size: 2,
            max_retries: 3,
            concurrency: 2,
            strict: false,
        },
    );

    let packages = searcher.search(&terms(&["widgets"]), &[]).await.unwrap();

    assert_eq!(packages.len(), 5);
    let mut ids: Vec<&str> = packages.iter().map(|pkg| pkg.id.as_str()).collect();
    ids.sort();
    assert_eq!(
        ids,
        vec![
            "Widget.Five",
            "Widget.Four",
            "Widget.One",
            "Widget.Three",
            "Widget.Two",
        ]
    );
}

#[tokio::test]
async fn duplicate_ids_across_terms_collapse() {
    let client = Arc::new(ScriptedRegistry::new(&[
        (
            "https://registry.test/query?q=alpha&take=1",
            r#"{"totalHits": 1, "data": []}"#,
        ),
        (
            "https://registry.test/query?q=alpha&take=20&skip=0",
            r#"{"totalHits": 1, "data": [{"id": "Foo.Bar", "version": "1.0.0"}]}"#,
        ),
        (
            "https://registry.test/query?q=beta&take=1",
            r#"{"totalHits": 1, "data": []}"#,
        ),
        (
            "https://registry.test/query?q=beta&take=20&skip=0",
            r#"{"totalHits": 1, "data": [{"id": "FOO.BAR", "version": "2.0.0"}]}"#,
        ),
    ]));
    let searcher = searcher(client, false);

    let packages = searcher
        .search(&terms(&["alpha", "beta"]), &[])
        .await
        .unwrap();

    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].id.as_str(), "Foo.Bar");
    assert_eq!(packages[0].version, "1.0.0");
}

#[tokio::test]
async fn ignore_list_matches_any_casing() {
    let client = Arc::new(ScriptedRegistry::new(&[
        (
            "https://registry.test/query?q=json&take=1",
            r#"{"totalHits": 2, "data": []}"#,
        ),
        (
            "https://registry.test/query?q=json&take=20&skip=0",
            r#"{"totalHits": 2, "data": [
                {"id": "Newtonsoft.Json", "version": "13.0.3"},
                {"id": "Serilog", "version": "4.0.0"}
            ]}"#,
        ),
    ]));
    let searcher = searcher(client, false);

    let packages = searcher
        .search(&terms(&["json"]), &["NEWTONSOFT.JSON".to_string()])
        .await
        .unwrap();

    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].id.as_str(), "Serilog");
}

#[tokio::test]
async fn failed_term_is_skipped() {
    let client = Arc::new(ScriptedRegistry::new(&[
        (
            "https://registry.test/query?q=good&take=1",
            r#"{"totalHits": 1, "data": []}"#,
        ),
        (
            "https://registry.test/query?q=good&take=20&skip=0",
            r#"{"totalHits": 1, "data": [{"id": "Serilog", "version": "4.0.0"}]}"#,
        ),
    ]));
    let searcher = searcher(client, false);

    let packages = searcher
        .search(&terms(&["missing", "good"]), &[])
        .await
        .unwrap();

    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].id.as_str(), "Serilog");
}

#[tokio::test]
async fn strict_mode_propagates_term_failure() {
    let client = Arc::new(ScriptedRegistry::new(&[]));
    let searcher = searcher(client, true);

    let err = searcher.search(&terms(&["missing"]), &[]).await.unwrap_err();

    assert_matches!(err, TrawlError::QueryFailed { attempts: 3, .. });
}
