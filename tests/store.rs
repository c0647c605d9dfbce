use std::io::Write;

use camino::Utf8PathBuf;

use nupkg_trawler::domain::Package;
use nupkg_trawler::store::DownloadStore;

fn package(id: &str, version: &str) -> Package {
    Package {
        id: id.parse().unwrap(),
        version: version.to_string(),
        description: None,
        authors: None,
        total_downloads: None,
        verified: None,
        local_filepath: None,
    }
}

fn temp_store() -> (tempfile::TempDir, DownloadStore) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("packages")).unwrap();
    (temp, DownloadStore::new_with_root(root))
}

#[test]
fn promote_moves_staged_archive_into_place() {
    let (_temp, store) = temp_store();
    store.ensure_root().unwrap();

    let pkg = package("Foo.Bar", "1.0.0");
    let dest = store.archive_path(&pkg);

    let mut staged = store.stage_archive().unwrap();
    staged.write_all(b"PK\x03\x04").unwrap();
    DownloadStore::promote(staged, &dest).unwrap();

    assert_eq!(std::fs::read(dest.as_std_path()).unwrap(), b"PK\x03\x04");
}

#[test]
fn promote_replaces_existing_archive() {
    let (_temp, store) = temp_store();
    store.ensure_root().unwrap();

    let pkg = package("Foo.Bar", "1.0.0");
    let dest = store.archive_path(&pkg);
    std::fs::write(dest.as_std_path(), b"old").unwrap();

    let mut staged = store.stage_archive().unwrap();
    staged.write_all(b"new").unwrap();
    DownloadStore::promote(staged, &dest).unwrap();

    assert_eq!(std::fs::read(dest.as_std_path()).unwrap(), b"new");
}

#[test]
fn dropped_stage_leaves_nothing_behind() {
    let (_temp, store) = temp_store();
    store.ensure_root().unwrap();

    {
        let mut staged = store.stage_archive().unwrap();
        staged.write_all(b"partial").unwrap();
    }

    assert!(store.list().unwrap().is_empty());
    let leftovers: Vec<_> = std::fs::read_dir(store.root().as_std_path())
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn list_returns_sorted_archives_only() {
    let (_temp, store) = temp_store();
    store.ensure_root().unwrap();

    for name in ["serilog.4.0.0.nupkg", "nlog.5.3.0.nupkg", "notes.txt"] {
        std::fs::write(store.root().join(name).as_std_path(), b"x").unwrap();
    }

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].ends_with("nlog.5.3.0.nupkg"));
    assert!(listed[1].ends_with("serilog.4.0.0.nupkg"));
}

#[test]
fn list_on_missing_root_is_empty() {
    let (_temp, store) = temp_store();
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn clear_removes_the_store_root() {
    let (_temp, store) = temp_store();
    store.ensure_root().unwrap();
    std::fs::write(store.root().join("foo.bar.1.0.0.nupkg").as_std_path(), b"x").unwrap();

    store.clear().unwrap();

    assert!(!store.root().as_std_path().exists());
    store.clear().unwrap();
}

#[test]
fn write_json_atomic_creates_parents() {
    let temp = tempfile::tempdir().unwrap();
    let out = Utf8PathBuf::from_path_buf(temp.path().join("reports/run/report.json")).unwrap();

    DownloadStore::write_json_atomic(&out, &serde_json::json!({"discovered": 3})).unwrap();

    let content = std::fs::read_to_string(out.as_std_path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["discovered"], 3);
}
