// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Public key cache keyed by ACL address

use async_trait::async_trait;
use fhevm_session::storage::{
    BlobUpdate, FileMedium, MediumError, MemoryMedium, PublicKeyData, PublicKeyStore,
    PublicKeyStoreError, StorageMedium, PUBLIC_KEY_STORAGE_KEY,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const ACL: &str = "0x50157CFfD6bBFA2DECe204a89ec419c23ef5755D";
const OTHER_ACL: &str = "0x687820221192C5B662b25367F70076A37bc79b6c";

/// Memory medium whose reads and writes yield for a while
#[derive(Clone, Default)]
struct SlowMedium {
    inner: MemoryMedium,
}

const LATENCY: Duration = Duration::from_millis(5);

#[async_trait]
impl StorageMedium for SlowMedium {
    async fn read(&self, namespace: &str) -> Result<Option<String>, MediumError> {
        let blob = self.inner.read(namespace).await;
        tokio::time::sleep(LATENCY).await;
        blob
    }

    async fn write(&self, namespace: &str, blob: String) -> Result<(), MediumError> {
        tokio::time::sleep(LATENCY).await;
        self.inner.write(namespace, blob).await
    }

    async fn delete(&self, namespace: &str) -> Result<(), MediumError> {
        self.inner.delete(namespace).await
    }

    async fn update(&self, namespace: &str, update: BlobUpdate) -> Result<(), MediumError> {
        tokio::time::sleep(LATENCY).await;
        self.inner.update(namespace, update).await
    }
}

#[tokio::test]
async fn test_round_trip() {
    let store = PublicKeyStore::new(Arc::new(MemoryMedium::new()));
    store.set(ACL, &[1, 2, 3], &[9, 8]).await;

    let data = assert_ok!(store.get(ACL).await);
    assert_eq!(
        data,
        PublicKeyData {
            public_key: vec![1, 2, 3],
            public_params: vec![9, 8],
        }
    );
}

#[tokio::test]
async fn test_address_case_is_ignored() {
    let store = PublicKeyStore::new(Arc::new(MemoryMedium::new()));
    store.set(ACL, &[1], &[2]).await;

    let lower = store.get(&ACL.to_lowercase()).await.unwrap();
    assert_eq!(lower.public_key, vec![1]);
}

#[tokio::test]
async fn test_missing_entry_is_not_found() {
    let store = PublicKeyStore::new(Arc::new(MemoryMedium::new()));
    let err = assert_err!(store.get(ACL).await);
    assert!(matches!(err, PublicKeyStoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_unparsable_entry_is_corrupt() {
    let medium = Arc::new(MemoryMedium::new());
    let blob = serde_json::json!({ ACL.to_lowercase(): "{\"publicKey\":\"oops\"}" });
    medium.put_raw(PUBLIC_KEY_STORAGE_KEY, blob.to_string()).await;

    let store = PublicKeyStore::new(medium);
    let err = store.get(ACL).await.unwrap_err();
    assert!(
        matches!(err, PublicKeyStoreError::CorruptData { .. }),
        "Expected CorruptData, got {:?}",
        err
    );
}

#[tokio::test]
async fn test_typed_array_object_form_is_accepted() {
    let medium = Arc::new(MemoryMedium::new());
    let entry = serde_json::json!({
        "publicKey": { "0": 5, "1": 6 },
        "publicParams": [7],
    });
    let blob = serde_json::json!({ ACL.to_lowercase(): entry.to_string() });
    medium.put_raw(PUBLIC_KEY_STORAGE_KEY, blob.to_string()).await;

    let store = PublicKeyStore::new(medium);
    let data = store.get(ACL).await.unwrap();
    assert_eq!(data.public_key, vec![5, 6]);
    assert_eq!(data.public_params, vec![7]);
}

#[tokio::test]
async fn test_remove_and_clear() {
    let store = PublicKeyStore::new(Arc::new(MemoryMedium::new()));
    store.set(ACL, &[1], &[2]).await;
    store.set("0x0000000000000000000000000000000000000001", &[3], &[4]).await;

    store.remove(ACL).await;
    assert!(store.get(ACL).await.is_err());
    assert!(store
        .get("0x0000000000000000000000000000000000000001")
        .await
        .is_ok());

    store.clear().await;
    assert!(store
        .get("0x0000000000000000000000000000000000000001")
        .await
        .is_err());
}

#[tokio::test]
async fn test_file_backed_cache_survives_restart() {
    let dir = TempDir::new().unwrap();
    PublicKeyStore::new(Arc::new(FileMedium::new(dir.path())))
        .set(ACL, &[42; 16], &[7; 4])
        .await;

    let reopened = PublicKeyStore::new(Arc::new(FileMedium::new(dir.path())));
    let data = reopened.get(ACL).await.unwrap();
    assert_eq!(data.public_key, vec![42; 16]);
    assert_eq!(data.public_params, vec![7; 4]);
}

#[tokio::test]
async fn test_independent_stores_over_slow_medium_keep_both_keys() {
    let medium = SlowMedium::default();
    let first = PublicKeyStore::new(Arc::new(medium.clone()));
    let second = PublicKeyStore::new(Arc::new(medium.clone()));

    tokio::join!(
        first.set(ACL, &[1; 8], &[2; 4]),
        second.set(OTHER_ACL, &[3; 8], &[4; 4]),
    );

    let reader = PublicKeyStore::new(Arc::new(medium));
    assert_eq!(assert_ok!(reader.get(ACL).await).public_key, vec![1; 8]);
    assert_eq!(assert_ok!(reader.get(OTHER_ACL).await).public_key, vec![3; 8]);
}

#[tokio::test]
async fn test_independent_file_stores_keep_both_keys() {
    let dir = TempDir::new().unwrap();
    let first = PublicKeyStore::new(Arc::new(FileMedium::new(dir.path())));
    let second = PublicKeyStore::new(Arc::new(FileMedium::new(dir.path())));

    tokio::join!(
        first.set(ACL, &[5; 8], &[6; 4]),
        second.set(OTHER_ACL, &[7; 8], &[8; 4]),
    );

    let reopened = PublicKeyStore::new(Arc::new(FileMedium::new(dir.path())));
    assert_eq!(assert_ok!(reopened.get(ACL).await).public_params, vec![6; 4]);
    assert_eq!(assert_ok!(reopened.get(OTHER_ACL).await).public_params, vec![8; 4]);
}
