//! Integration tests for the metadata lifecycle
//!
//! These tests drive the engine end to end over in-memory, faulty,
//! read-only and file-backed storage.

mod common;

use common::{faulty_engine, memory_engine, memory_engine_with};
use std::collections::BTreeMap;
use std::sync::Arc;
use vkv_core::{FileStorage, KvConfig, MasterKey, MemoryStorage, ReadOnlyStorage};
use vkv_engine::{KvEngine, WriteDataRequest, WriteMetadataRequest};

fn custom(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let engine = memory_engine();

    let resp = engine
        .write_metadata(
            WriteMetadataRequest::new("app/db")
                .with_max_versions(5)
                .with_cas_required(true),
        )
        .await
        .unwrap();
    assert!(!resp.is_error());
    assert!(resp.warnings.is_empty());

    let view = engine.read_metadata("app/db").await.unwrap().unwrap();
    assert_eq!(view.max_versions, 5);
    assert!(view.cas_required);
    assert_eq!(view.current_version, 0);
    assert!(view.versions.is_empty());
    assert_eq!(view.delete_version_after, "0s");
    assert!(!view.created_time.is_empty());
}

#[tokio::test]
async fn test_partial_update_keeps_omitted_fields() {
    let engine = memory_engine();

    engine
        .write_metadata(
            WriteMetadataRequest::new("app/db")
                .with_max_versions(5)
                .with_cas_required(true)
                .with_delete_version_after(120),
        )
        .await
        .unwrap();
    engine
        .write_metadata(
            WriteMetadataRequest::new("app/db").with_custom_metadata(custom(&[("team", "core")])),
        )
        .await
        .unwrap();

    let view = engine.read_metadata("app/db").await.unwrap().unwrap();
    assert_eq!(view.max_versions, 5);
    assert!(view.cas_required);
    assert_eq!(view.delete_version_after, "2m0s");
    assert_eq!(view.custom_metadata, custom(&[("team", "core")]));
}

#[tokio::test]
async fn test_zero_delete_version_after_clears_override() {
    let engine = memory_engine();

    engine
        .write_metadata(WriteMetadataRequest::new("k").with_delete_version_after(300))
        .await
        .unwrap();
    engine
        .write_metadata(WriteMetadataRequest::new("k").with_delete_version_after(0))
        .await
        .unwrap();

    let view = engine.read_metadata("k").await.unwrap().unwrap();
    assert_eq!(view.delete_version_after, "0s");
}

#[tokio::test]
async fn test_backend_mandated_cas_wins_with_warning() {
    let engine = memory_engine_with(KvConfig {
        cas_required: true,
        ..Default::default()
    });

    let resp = engine
        .write_metadata(WriteMetadataRequest::new("k").with_cas_required(false))
        .await
        .unwrap();
    assert!(!resp.is_error());
    assert_eq!(
        resp.warnings,
        vec![
            "\"cas_required\" set to false, but is mandated by backend config. This value will be ignored."
                .to_string()
        ]
    );

    let view = engine.read_metadata("k").await.unwrap().unwrap();
    assert!(view.cas_required);
}

#[tokio::test]
async fn test_invalid_custom_metadata_reports_every_violation() {
    let engine = memory_engine();
    let long_key = "k".repeat(129);
    let metadata = custom(&[("empty", ""), (long_key.as_str(), "v")]);

    let resp = engine
        .write_metadata(WriteMetadataRequest::new("k").with_custom_metadata(metadata))
        .await
        .unwrap();

    let error = resp.error.unwrap();
    assert!(error.starts_with("2 errors occurred:"));
    assert!(error.contains("length of value for key \"empty\""));
    assert!(error.contains("is 129 but must be 0 < len(key) <= 128"));
    assert!(!engine.metadata_exists("k").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_do_not_lose_updates() {
    for round in 0..20 {
        let engine = Arc::new(memory_engine());
        let path = format!("race/{}", round);

        let first = {
            let engine = engine.clone();
            let path = path.clone();
            tokio::spawn(async move {
                engine
                    .write_metadata(WriteMetadataRequest::new(path).with_max_versions(3))
                    .await
            })
        };
        let second = {
            let engine = engine.clone();
            let path = path.clone();
            tokio::spawn(async move {
                engine
                    .write_metadata(
                        WriteMetadataRequest::new(path).with_custom_metadata(custom(&[("a", "b")])),
                    )
                    .await
            })
        };

        assert!(!first.await.unwrap().unwrap().is_error());
        assert!(!second.await.unwrap().unwrap().is_error());

        let view = engine.read_metadata(&path).await.unwrap().unwrap();
        assert_eq!(view.max_versions, 3);
        assert_eq!(view.custom_metadata, custom(&[("a", "b")]));
    }
}

#[tokio::test]
async fn test_list_returns_immediate_children() {
    let engine = memory_engine();
    for path in ["app/db", "app/cache/redis", "app/cache/memcached", "billing"] {
        engine
            .write_metadata(WriteMetadataRequest::new(path).with_max_versions(1))
            .await
            .unwrap();
    }

    assert_eq!(engine.list_metadata("").await.unwrap(), vec!["app/", "billing"]);
    assert_eq!(engine.list_metadata("app/").await.unwrap(), vec!["cache/", "db"]);
    assert_eq!(
        engine.list_metadata("app/cache").await.unwrap(),
        vec!["memcached", "redis"]
    );
    assert!(engine.list_metadata("nothing/").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_full_erase_is_idempotent() {
    let (storage, engine) = faulty_engine();
    for i in 0..3 {
        engine
            .write_data(WriteDataRequest::new("app/db", format!("v{}", i)))
            .await
            .unwrap();
    }
    assert_eq!(storage.payload_count().await, 3);

    engine.delete_metadata("app/db").await.unwrap();
    assert_eq!(storage.payload_count().await, 0);
    assert!(engine.read_metadata("app/db").await.unwrap().is_none());

    engine.delete_metadata("app/db").await.unwrap();
    engine.delete_metadata("never/written").await.unwrap();
}

#[tokio::test]
async fn test_partial_erase_failure_is_recoverable() {
    let (storage, engine) = faulty_engine();
    for i in 0..3 {
        engine
            .write_data(WriteDataRequest::new("app/db", format!("v{}", i)))
            .await
            .unwrap();
    }

    storage.fail_deletes_after(1);
    let err = engine.delete_metadata("app/db").await.unwrap_err();
    assert!(err.storage_error().is_some());

    // Metadata survives so the erase can be retried
    assert_eq!(storage.payload_count().await, 2);
    let view = engine.read_metadata("app/db").await.unwrap().unwrap();
    assert_eq!(view.versions.len(), 3);

    storage.heal();
    engine.delete_metadata("app/db").await.unwrap();
    assert_eq!(storage.payload_count().await, 0);
    assert!(engine.read_metadata("app/db").await.unwrap().is_none());
}

#[tokio::test]
async fn test_existence_on_uninitialized_read_only_storage() {
    let storage = Arc::new(ReadOnlyStorage::new(MemoryStorage::new()));
    let engine = KvEngine::new(storage, MasterKey::generate());

    assert!(!engine.metadata_exists("app/db").await.unwrap());

    // Only the existence check swallows the read-only condition
    let err = engine.read_metadata("app/db").await.unwrap_err();
    assert!(err.is_read_only());
}

#[tokio::test]
async fn test_existence_on_initialized_read_only_storage() {
    let raw = Arc::new(MemoryStorage::new());
    let master = MasterKey::generate();

    let writer = KvEngine::new(raw.clone(), master.clone());
    writer
        .write_metadata(WriteMetadataRequest::new("app/db").with_max_versions(2))
        .await
        .unwrap();

    let reader = KvEngine::new(Arc::new(ReadOnlyStorage::new(raw)), master);
    assert!(reader.metadata_exists("app/db").await.unwrap());
    assert!(!reader.metadata_exists("app/other").await.unwrap());
}

fn is_decryption(err: &vkv_engine::Error) -> bool {
    matches!(
        err.storage_error(),
        Some(vkv_core::StorageError::Decryption { .. })
    )
}

#[tokio::test]
async fn test_wrong_master_key_is_not_absence() {
    let raw = Arc::new(MemoryStorage::new());

    let writer = KvEngine::new(raw.clone(), MasterKey::generate());
    writer
        .write_metadata(WriteMetadataRequest::new("app").with_max_versions(2))
        .await
        .unwrap();
    writer
        .write_data(WriteDataRequest::new("app", "v1"))
        .await
        .unwrap();
    let keys_before = raw.keys().await;

    let intruder = KvEngine::new(raw.clone(), MasterKey::generate());

    let err = intruder.read_metadata("app").await.unwrap_err();
    assert!(is_decryption(&err), "read_metadata: {:?}", err);

    let err = intruder.read_data("app", None).await.unwrap_err();
    assert!(is_decryption(&err), "read_data: {:?}", err);

    let err = intruder.metadata_exists("app").await.unwrap_err();
    assert!(is_decryption(&err), "metadata_exists: {:?}", err);

    let err = intruder
        .write_metadata(WriteMetadataRequest::new("app").with_max_versions(5))
        .await
        .unwrap_err();
    assert!(is_decryption(&err), "write_metadata: {:?}", err);

    let err = intruder.list_metadata("").await.unwrap_err();
    assert!(is_decryption(&err), "list_metadata: {:?}", err);

    // Nothing was written under the wrong key
    assert_eq!(raw.keys().await, keys_before);
    let view = writer.read_metadata("app").await.unwrap().unwrap();
    assert_eq!(view.max_versions, 2);
}

#[tokio::test]
async fn test_file_backed_engine_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let master = MasterKey::generate();

    {
        let storage = FileStorage::open(dir.path()).await.unwrap();
        let engine = KvEngine::new(Arc::new(storage), master.clone());
        engine
            .write_metadata(
                WriteMetadataRequest::new("team/api")
                    .with_custom_metadata(custom(&[("owner", "platform")])),
            )
            .await
            .unwrap();
        engine
            .write_data(WriteDataRequest::new("team/api", "token"))
            .await
            .unwrap();
    }

    let storage = FileStorage::open(dir.path()).await.unwrap();
    let engine = KvEngine::new(Arc::new(storage), master);

    let view = engine.read_metadata("team/api").await.unwrap().unwrap();
    assert_eq!(view.current_version, 1);
    assert_eq!(view.custom_metadata, custom(&[("owner", "platform")]));
    assert_eq!(engine.list_metadata("team").await.unwrap(), vec!["api"]);

    let secret = engine.read_data("team/api", None).await.unwrap().unwrap();
    assert_eq!(secret.data.as_deref(), Some(b"token".as_slice()));
}
