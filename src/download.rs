use std::sync::Arc;

use camino::Utf8Path;
use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use crate::domain::Package;
use crate::error::TrawlError;
use crate::registry::RegistryClient;
use crate::store::DownloadStore;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub blob_base_url: String,
    pub concurrency: usize,
}

pub struct Downloader<C> {
    client: Arc<C>,
    store: DownloadStore,
    blob_base_url: String,
    concurrency: usize,
}

impl<C> Clone for Downloader<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            store: self.store.clone(),
            blob_base_url: self.blob_base_url.clone(),
            concurrency: self.concurrency,
        }
    }
}

impl<C: RegistryClient + 'static> Downloader<C> {
    pub fn new(client: Arc<C>, store: DownloadStore, options: DownloadOptions) -> Self {
        Self {
            client,
            store,
            blob_base_url: options.blob_base_url,
            concurrency: options.concurrency.max(1),
        }
    }

    pub fn download_url_for(&self, package: &Package) -> String {
        archive_url(&self.blob_base_url, package)
    }

    /// Downloads every package's archive into the store over a fixed worker
    /// pool fed through a bounded channel. Every input package comes back:
    /// a failed download is logged and returned without a local path.
    pub async fn download_all(&self, packages: Vec<Package>) -> Result<Vec<Package>, TrawlError> {
        self.store.ensure_root()?;
        info!(count = packages.len(), root = %self.store.root(), "downloading packages");

        let (tx, rx) = mpsc::channel::<Package>(self.concurrency);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::new();
        for _ in 0..self.concurrency {
            let downloader = self.clone();
            let rx = Arc::clone(&rx);
            workers.push(tokio::spawn(async move {
                let mut batch: Vec<Package> = Vec::new();
                loop {
                    let next = { rx.lock().await.recv().await };
                    let Some(package) = next else { break };
                    batch.push(downloader.download_package(package).await);
                }
                batch
            }));
        }

        for package in packages {
            if tx.send(package).await.is_err() {
                break;
            }
        }
        drop(tx);

        let mut finished = Vec::new();
        for outcome in join_all(workers).await {
            let batch = outcome.map_err(|err| TrawlError::Worker(err.to_string()))?;
            finished.extend(batch);
        }
        Ok(finished)
    }

    async fn download_package(&self, mut package: Package) -> Package {
        let url = archive_url(&self.blob_base_url, &package);
        let dest = self.store.archive_path(&package);
        match self.fetch_archive(&url, &dest).await {
            Ok(()) => {
                package.local_filepath = Some(dest);
            }
            Err(err) => {
                warn!(
                    error = %err,
                    package = %package.id,
                    version = %package.version,
                    "download failed"
                );
            }
        }
        package
    }

    async fn fetch_archive(&self, url: &str, dest: &Utf8Path) -> Result<(), TrawlError> {
        let staged = self.store.stage_archive()?;
        self.client.download_file(url, staged.path()).await?;
        DownloadStore::promote(staged, dest)
    }
}

fn archive_url(base_url: &str, package: &Package) -> String {
    let id = package.id.normalized();
    let version = package.version.to_lowercase();
    format!("{base_url}/{id}/{version}/{id}.{version}.nupkg")
}
