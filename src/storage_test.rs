use super::*;

fn temp_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("dayflow-storage-{}", uuid::Uuid::new_v4()))
        .join("session.json")
}

#[test]
fn memory_storage_set_get_remove() {
    let storage = MemoryStorage::new();
    assert!(storage.get(ACCESS_TOKEN_KEY).is_none());

    storage.set(ACCESS_TOKEN_KEY, "tok").unwrap();
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).as_deref(), Some("tok"));

    storage.remove(ACCESS_TOKEN_KEY).unwrap();
    assert!(storage.get(ACCESS_TOKEN_KEY).is_none());
    assert!(storage.is_empty());
}

#[test]
fn json_helpers_round_trip_and_drop_garbage() {
    let storage = MemoryStorage::new();
    save_json(&storage, USER_KEY, &serde_json::json!({ "name": "Ada" })).unwrap();
    let loaded: serde_json::Value = load_json(&storage, USER_KEY).unwrap();
    assert_eq!(loaded["name"], "Ada");

    storage.set(USER_KEY, "{not json").unwrap();
    assert!(load_json::<serde_json::Value>(&storage, USER_KEY).is_none());
}

#[test]
fn file_storage_missing_file_reads_empty() {
    let path = temp_path();
    let storage = FileStorage::open(&path).unwrap();
    assert!(storage.get(USER_KEY).is_none());
    assert!(!path.exists(), "opening must not create the file");
}

#[test]
fn file_storage_persists_across_reopen() {
    let path = temp_path();
    {
        let storage = FileStorage::open(&path).unwrap();
        storage.set(ACCESS_TOKEN_KEY, "abc").unwrap();
        storage.set(USER_KEY, "{}").unwrap();
    }

    let reopened = FileStorage::open(&path).unwrap();
    assert_eq!(reopened.get(ACCESS_TOKEN_KEY).as_deref(), Some("abc"));

    reopened.remove(ACCESS_TOKEN_KEY).unwrap();
    let again = FileStorage::open(&path).unwrap();
    assert!(again.get(ACCESS_TOKEN_KEY).is_none());
    assert_eq!(again.get(USER_KEY).as_deref(), Some("{}"));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn file_storage_failed_write_leaves_memory_unchanged() {
    let path = temp_path();
    let dir = path.parent().unwrap().to_path_buf();
    let storage = FileStorage::open(&path).unwrap();
    storage.set(USER_KEY, "{}").unwrap();

    // Replace the directory with a plain file so every flush fails.
    std::fs::remove_dir_all(&dir).unwrap();
    std::fs::write(&dir, "not a directory").unwrap();

    assert!(storage.set(ACCESS_TOKEN_KEY, "tok").is_err());
    assert!(storage.get(ACCESS_TOKEN_KEY).is_none());
    assert!(storage.remove(USER_KEY).is_err());
    assert_eq!(storage.get(USER_KEY).as_deref(), Some("{}"));

    let _ = std::fs::remove_file(&dir);
}

#[test]
fn file_storage_rejects_corrupt_file() {
    let path = temp_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[1, 2").unwrap();

    let err = FileStorage::open(&path).unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
