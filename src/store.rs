use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::Serialize;
use tempfile::{Builder, NamedTempFile};

use crate::domain::Package;
use crate::error::TrawlError;

#[derive(Debug, Clone)]
pub struct DownloadStore {
    root: Utf8PathBuf,
}

impl DownloadStore {
    pub fn new() -> Result<Self, TrawlError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir()
                        .join(".cache")
                        .join("nupkg-trawler")
                        .join("packages"),
                )
                .ok()
            })
            .ok_or_else(|| {
                TrawlError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn archive_path(&self, package: &Package) -> Utf8PathBuf {
        self.root.join(package.archive_file_name())
    }

    pub fn ensure_root(&self) -> Result<(), TrawlError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| TrawlError::Filesystem(err.to_string()))
    }

    /// Temp landing spot inside the store root, so the finishing rename stays
    /// on one filesystem. Dropped unpersisted on failure.
    pub fn stage_archive(&self) -> Result<NamedTempFile, TrawlError> {
        Builder::new()
            .prefix("nupkg-trawler")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| TrawlError::Filesystem(err.to_string()))
    }

    pub fn promote(staged: NamedTempFile, dest: &Utf8Path) -> Result<(), TrawlError> {
        if dest.as_std_path().exists() {
            fs::remove_file(dest.as_std_path())
                .map_err(|err| TrawlError::Filesystem(err.to_string()))?;
        }
        staged
            .persist(dest.as_std_path())
            .map_err(|err| TrawlError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), TrawlError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| TrawlError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(value)
            .map_err(|err| TrawlError::Filesystem(err.to_string()))?;
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| TrawlError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| TrawlError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Utf8PathBuf>, TrawlError> {
        if !self.root.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let mut archives = Vec::new();
        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| TrawlError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| TrawlError::Filesystem(err.to_string()))?;
            let path = Utf8PathBuf::from_path_buf(entry.path())
                .map_err(|_| TrawlError::Filesystem("non-utf8 path in store".to_string()))?;
            if path.is_file() && path.extension() == Some("nupkg") {
                archives.push(path);
            }
        }
        archives.sort();
        Ok(archives)
    }

    pub fn clear(&self) -> Result<(), TrawlError> {
        if self.root.as_std_path().exists() {
            fs::remove_dir_all(self.root.as_std_path())
                .map_err(|err| TrawlError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package() -> Package {
        Package {
            id: "Newtonsoft.Json".parse().unwrap(),
            version: "13.0.3".to_string(),
            description: None,
            authors: None,
            total_downloads: None,
            verified: None,
            local_filepath: None,
        }
    }

    #[test]
    fn layout_paths() {
        let store = DownloadStore::new_with_root(Utf8PathBuf::from("/tmp/trawl"));
        let pkg = sample_package();

        let archive = store.archive_path(&pkg);
        assert!(archive.ends_with("newtonsoft.json.13.0.3.nupkg"));
        assert!(archive.starts_with(store.root()));
    }
}
