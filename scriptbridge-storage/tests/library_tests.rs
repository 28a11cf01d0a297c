use pretty_assertions::assert_eq;
use proptest::prelude::*;
use scriptbridge_storage::{
    FileStore, JsonFileStore, KeyValueStore, MemoryStore, ScriptLibrary, StorageError, STORAGE_KEY,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Backend that stalls on every read, widening the window between a
/// library's load and its save.
struct SlowStore {
    inner: MemoryStore,
}

impl KeyValueStore for SlowStore {
    fn get(&self, key: &str) -> scriptbridge_storage::StorageResult<Option<String>> {
        thread::sleep(Duration::from_millis(50));
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> scriptbridge_storage::StorageResult<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> scriptbridge_storage::StorageResult<bool> {
        self.inner.remove(key)
    }
}

// ── MemoryStore ──────────────────────────────────────────────────

#[test]
fn memory_store_set_get_remove() {
    let store = MemoryStore::new();
    assert_eq!(store.get("k").unwrap(), None);
    store.set("k", "v1").unwrap();
    store.set("k", "v2").unwrap();
    assert_eq!(store.get("k").unwrap(), Some("v2".to_string()));
    assert!(store.remove("k").unwrap());
    assert!(!store.remove("k").unwrap());
}

// ── JsonFileStore ────────────────────────────────────────────────

#[test]
fn json_file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let store = JsonFileStore::open(&path).unwrap();
    store.set("a", "1").unwrap();
    store.set("b", "2").unwrap();
    store.remove("a").unwrap();
    drop(store);

    let reopened = JsonFileStore::open(&path).unwrap();
    assert_eq!(reopened.get("a").unwrap(), None);
    assert_eq!(reopened.get("b").unwrap(), Some("2".to_string()));
}

#[test]
fn json_file_store_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("nested/new.json")).unwrap();
    assert_eq!(store.get("anything").unwrap(), None);

    store.set("k", "v").unwrap();
    assert!(store.path().exists());
}

#[test]
fn json_file_store_rejects_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = JsonFileStore::open(&path).unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
}

// ── ScriptLibrary ────────────────────────────────────────────────

#[test]
fn write_then_read() {
    let library = ScriptLibrary::open_in_memory();
    library.write_file("hello.lua", "return 1").unwrap();

    assert!(library.file_exists("hello.lua").unwrap());
    assert_eq!(library.read_file("hello.lua").unwrap(), Some("return 1".to_string()));
    assert_eq!(library.read_file("missing.lua").unwrap(), None);
    assert!(!library.file_exists("missing.lua").unwrap());
}

#[test]
fn last_write_wins() {
    let library = ScriptLibrary::open_in_memory();
    library.write_file("a.lua", "v1").unwrap();
    library.write_file("a.lua", "v2").unwrap();

    assert_eq!(library.read_file("a.lua").unwrap(), Some("v2".to_string()));
    assert_eq!(library.list_files().unwrap(), vec!["a.lua".to_string()]);
}

#[test]
fn list_is_case_insensitive() {
    let library = ScriptLibrary::open_in_memory();
    for name in ["b.js", "A.js", "c.js"] {
        library.write_file(name, "").unwrap();
    }
    assert_eq!(library.list_files().unwrap(), vec!["A.js", "b.js", "c.js"]);
}

#[test]
fn delete_removes_only_that_file() {
    let library = ScriptLibrary::open_in_memory();
    library.write_file("keep.lua", "1").unwrap();
    library.write_file("drop.lua", "2").unwrap();

    assert!(library.delete_file("drop.lua").unwrap());
    assert!(!library.delete_file("drop.lua").unwrap());
    assert_eq!(library.list_files().unwrap(), vec!["keep.lua"]);
}

#[test]
fn library_is_one_map_under_the_well_known_key() {
    let store = Arc::new(MemoryStore::new());
    let library = ScriptLibrary::new(store.clone());
    library.write_file("x.lua", "return x").unwrap();

    let raw = store.get(STORAGE_KEY).unwrap().unwrap();
    let map: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(map, serde_json::json!({ "x.lua": "return x" }));
}

#[test]
fn corrupt_library_value_is_invalid_data() {
    let store = Arc::new(MemoryStore::new());
    store.set(STORAGE_KEY, "[1, 2]").unwrap();
    let library = ScriptLibrary::new(store);

    assert!(matches!(library.list_files(), Err(StorageError::InvalidData(_))));
}

#[test]
fn file_backed_library_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scripts.json");

    ScriptLibrary::open(&path).unwrap().write_file("boot.lua", "print(1)").unwrap();

    let library = ScriptLibrary::open(&path).unwrap();
    assert_eq!(library.read_file("boot.lua").unwrap(), Some("print(1)".to_string()));
}

#[test]
fn concurrent_writes_to_different_names_keep_both() {
    let library = ScriptLibrary::new(Arc::new(SlowStore {
        inner: MemoryStore::new(),
    }));

    let writers: Vec<_> = ["a.lua", "b.lua"]
        .into_iter()
        .map(|name| {
            let library = library.clone();
            thread::spawn(move || library.write_file(name, "return 1").unwrap())
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(library.list_files().unwrap(), vec!["a.lua", "b.lua"]);
}

#[test]
fn concurrent_write_and_delete_do_not_lose_unrelated_files() {
    let library = ScriptLibrary::new(Arc::new(SlowStore {
        inner: MemoryStore::new(),
    }));
    library.write_file("old.lua", "x").unwrap();

    let deleter = {
        let library = library.clone();
        thread::spawn(move || library.delete_file("old.lua").unwrap())
    };
    let writer = {
        let library = library.clone();
        thread::spawn(move || library.write_file("new.lua", "y").unwrap())
    };
    assert!(deleter.join().unwrap());
    writer.join().unwrap();

    assert_eq!(library.list_files().unwrap(), vec!["new.lua"]);
}

// ── Properties ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn listing_is_sorted_without_regard_to_case(names in proptest::collection::btree_set("[a-zA-Z]{1,8}", 0..12)) {
        let library = ScriptLibrary::open_in_memory();
        for name in &names {
            library.write_file(name, name).unwrap();
        }
        let listed = library.list_files().unwrap();
        prop_assert_eq!(listed.len(), names.len());
        for pair in listed.windows(2) {
            prop_assert!(pair[0].to_lowercase() <= pair[1].to_lowercase());
        }
    }
}
