// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Public key cache
//!
//! Stores the network public key and public params per ACL contract address.
//! Entries are JSON `{"publicKey":[..],"publicParams":[..]}` with bytes as
//! numbers, so they survive any string medium.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::medium::StorageMedium;
use super::string_storage::GenericStringStorage;

pub const PUBLIC_KEY_STORAGE_KEY: &str = "fhevm-public-key-storage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyData {
    pub public_key: Vec<u8>,
    pub public_params: Vec<u8>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublicKeyStoreError {
    #[error("No public key found for ACL {acl_address}")]
    NotFound { acl_address: String },

    #[error("Failed to parse stored public key for ACL {acl_address}: {reason}")]
    CorruptData { acl_address: String, reason: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry<'a> {
    public_key: &'a [u8],
    public_params: &'a [u8],
}

#[derive(Clone)]
pub struct PublicKeyStore {
    storage: GenericStringStorage,
}

impl PublicKeyStore {
    pub fn new(medium: Arc<dyn StorageMedium>) -> Self {
        Self {
            storage: GenericStringStorage::new(medium, PUBLIC_KEY_STORAGE_KEY),
        }
    }

    pub async fn get(&self, acl_address: &str) -> Result<PublicKeyData, PublicKeyStoreError> {
        let key = acl_address.to_lowercase();
        let stored = self
            .storage
            .get(&key)
            .await
            .ok_or_else(|| PublicKeyStoreError::NotFound {
                acl_address: acl_address.to_string(),
            })?;

        let corrupt = |reason: String| PublicKeyStoreError::CorruptData {
            acl_address: acl_address.to_string(),
            reason,
        };

        let parsed: Value = serde_json::from_str(&stored).map_err(|e| corrupt(e.to_string()))?;
        let public_key = parsed
            .get("publicKey")
            .ok_or_else(|| corrupt("missing publicKey".to_string()))
            .and_then(|v| decode_bytes(v).map_err(|e| corrupt(format!("publicKey: {}", e))))?;
        let public_params = parsed
            .get("publicParams")
            .ok_or_else(|| corrupt("missing publicParams".to_string()))
            .and_then(|v| decode_bytes(v).map_err(|e| corrupt(format!("publicParams: {}", e))))?;

        debug!(
            acl_address = %key,
            public_key_len = public_key.len(),
            public_params_len = public_params.len(),
            "Loaded cached public key"
        );

        Ok(PublicKeyData {
            public_key,
            public_params,
        })
    }

    pub async fn set(&self, acl_address: &str, public_key: &[u8], public_params: &[u8]) {
        let key = acl_address.to_lowercase();
        let entry = StoredEntry {
            public_key,
            public_params,
        };
        // byte slices always serialize
        let value = match serde_json::to_string(&entry) {
            Ok(value) => value,
            Err(e) => {
                debug!(acl_address = %key, "Failed to serialize public key: {}", e);
                return;
            }
        };
        self.storage.set(&key, &value).await;
    }

    pub async fn remove(&self, acl_address: &str) {
        self.storage.remove(&acl_address.to_lowercase()).await;
    }

    pub async fn clear(&self) {
        self.storage.clear().await;
    }
}

/// Accepts `[1,2,3]` or the typed-array object form `{"0":1,"1":2,"2":3}`
fn decode_bytes(value: &Value) -> Result<Vec<u8>, String> {
    match value {
        Value::Array(items) => items.iter().map(to_byte).collect(),
        Value::Object(map) => {
            let mut indexed = map
                .iter()
                .map(|(k, v)| {
                    let index = k
                        .parse::<usize>()
                        .map_err(|_| format!("non-numeric index '{}'", k))?;
                    Ok((index, to_byte(v)?))
                })
                .collect::<Result<Vec<(usize, u8)>, String>>()?;
            indexed.sort_by_key(|(index, _)| *index);
            Ok(indexed.into_iter().map(|(_, byte)| byte).collect())
        }
        Value::Null => Err("null".to_string()),
        other => Err(format!("expected byte array, got {}", other)),
    }
}

fn to_byte(value: &Value) -> Result<u8, String> {
    value
        .as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| format!("{} is not a byte", value))
}
