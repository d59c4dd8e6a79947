//! Persistence tests for the file store across reopen

use ferry_core_checkpoint::{source_key, CheckpointStore, FileStore};
use tempfile::TempDir;

#[test]
fn test_values_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let key = source_key("https://auth.example.com:3025", "default");

    {
        let mut store = FileStore::open(temp_dir.path()).unwrap();
        store.set(&format!("{key}.cursor"), "c-17").unwrap();
        store.set(&format!("{key}.last_id"), "evt-42").unwrap();
    }

    let store = FileStore::open(temp_dir.path()).unwrap();
    assert_eq!(
        store.get(&format!("{key}.cursor")).unwrap().as_deref(),
        Some("c-17")
    );
    assert_eq!(
        store.get(&format!("{key}.last_id")).unwrap().as_deref(),
        Some("evt-42")
    );
}

#[test]
fn test_sources_do_not_share_checkpoints() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = FileStore::open(temp_dir.path()).unwrap();

    let a = source_key("https://a.example.com", "default");
    let b = source_key("https://b.example.com", "default");
    store.set(&format!("{a}.cursor"), "a-page").unwrap();

    assert_eq!(store.get(&format!("{b}.cursor")).unwrap(), None);
}

#[test]
fn test_boxed_store_delegates() {
    let temp_dir = TempDir::new().unwrap();
    let mut store: Box<dyn CheckpointStore> =
        Box::new(FileStore::open(temp_dir.path()).unwrap());

    store.set("k", "v").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
}
