// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Namespaced string cache
//!
//! All entries of a namespace live in one JSON object blob on the medium. None
//! of the operations fail: a medium error or a corrupt blob is logged and the
//! call becomes a no-op (`get` returns `None`).

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use super::medium::{BlobUpdate, StorageMedium};

#[derive(Clone)]
pub struct GenericStringStorage {
    medium: Arc<dyn StorageMedium>,
    namespace: String,
}

impl GenericStringStorage {
    pub fn new(medium: Arc<dyn StorageMedium>, namespace: impl Into<String>) -> Self {
        Self {
            medium,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let entries = self.load().await?;
        match entries.get(key) {
            Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
            _ => None,
        }
    }

    pub async fn set(&self, key: &str, value: &str) {
        let key = key.to_string();
        let value = value.to_string();
        self.modify(move |entries| {
            entries.insert(key, Value::String(value));
            true
        })
        .await;
    }

    pub async fn remove(&self, key: &str) {
        let key = key.to_string();
        self.modify(move |entries| entries.remove(&key).is_some())
            .await;
    }

    pub async fn clear(&self) {
        if let Err(e) = self.medium.delete(&self.namespace).await {
            warn!(
                namespace = %self.namespace,
                "Failed to clear storage: {}", e
            );
        }
    }

    /// Current entries, `None` when the medium failed or the blob is corrupt
    async fn load(&self) -> Option<Map<String, Value>> {
        match self.medium.read(&self.namespace).await {
            Ok(blob) => parse_entries(&self.namespace, blob.as_deref()),
            Err(e) => {
                warn!(namespace = %self.namespace, "Failed to read from storage: {}", e);
                None
            }
        }
    }

    /// Run `change` over the entries inside one atomic medium update. The blob
    /// is rewritten only when `change` returns true.
    async fn modify<F>(&self, change: F)
    where
        F: FnOnce(&mut Map<String, Value>) -> bool + Send + 'static,
    {
        let namespace = self.namespace.clone();
        let update: BlobUpdate = Box::new(move |blob: Option<String>| {
            let Some(mut entries) = parse_entries(&namespace, blob.as_deref()) else {
                warn!(namespace = %namespace, "Skipping write, storage not readable");
                return None;
            };
            change(&mut entries).then(|| Value::Object(entries).to_string())
        });

        if let Err(e) = self.medium.update(&self.namespace, update).await {
            warn!(namespace = %self.namespace, "Failed to write to storage: {}", e);
        }
    }
}

fn parse_entries(namespace: &str, blob: Option<&str>) -> Option<Map<String, Value>> {
    let blob = match blob {
        Some(blob) if !blob.trim().is_empty() => blob,
        _ => return Some(Map::new()),
    };

    match serde_json::from_str::<Value>(blob) {
        Ok(Value::Object(entries)) => Some(entries),
        Ok(_) => {
            warn!(namespace = %namespace, "Stored blob is not a JSON object");
            None
        }
        Err(e) => {
            warn!(namespace = %namespace, "Failed to parse stored blob: {}", e);
            None
        }
    }
}
