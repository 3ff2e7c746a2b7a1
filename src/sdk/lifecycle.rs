// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Relayer SDK bootstrap
//!
//! The relayer SDK is a process-wide singleton: it is loaded once and its
//! one-time setup runs once. [`SdkLifecycle`] owns that state explicitly so
//! that builders share it through an `Arc` and tests can start from a fresh one.
//!
//! - `load()` is idempotent and coalesces concurrent callers on one load.
//! - `init()` is a no-op once the initialized flag is set. The flag only ever
//!   goes from false to true; writers are serialized by an async mutex.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::instance::{FhevmInstance, FhevmInstanceConfig};
use crate::config::settings::DEFAULT_SDK_LOAD_TIMEOUT_SECS;
use crate::error::FhevmError;

/// Options forwarded to the SDK's one-time setup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdkInitOptions {
    /// Worker threads for the SDK's proving backend
    pub thread_count: Option<usize>,
}

/// The loaded SDK object
#[async_trait]
pub trait RelayerSdk: Send + Sync {
    /// One-time setup; `false` means the SDK refused to initialize
    async fn init_sdk(&self, options: &SdkInitOptions) -> Result<bool, FhevmError>;

    /// Contract addresses and relayer endpoint of the production network
    fn production_config(&self) -> FhevmInstanceConfig;

    async fn create_instance(
        &self,
        config: FhevmInstanceConfig,
    ) -> Result<Arc<dyn FhevmInstance>, FhevmError>;
}

/// Makes the SDK object available in this process
#[async_trait]
pub trait SdkLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn RelayerSdk>, FhevmError>;
}

/// Loader for an SDK linked into the binary
pub struct StaticSdkLoader {
    sdk: Arc<dyn RelayerSdk>,
}

impl StaticSdkLoader {
    pub fn new(sdk: Arc<dyn RelayerSdk>) -> Self {
        Self { sdk }
    }
}

#[async_trait]
impl SdkLoader for StaticSdkLoader {
    async fn load(&self) -> Result<Arc<dyn RelayerSdk>, FhevmError> {
        Ok(self.sdk.clone())
    }
}

/// Loader for builds without a relayer SDK
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSdkLoader;

#[async_trait]
impl SdkLoader for UnavailableSdkLoader {
    async fn load(&self) -> Result<Arc<dyn RelayerSdk>, FhevmError> {
        Err(FhevmError::SdkLoad(
            "no relayer SDK is linked into this build".to_string(),
        ))
    }
}

pub struct SdkLifecycle {
    loader: Arc<dyn SdkLoader>,
    load_timeout: Duration,
    sdk: OnceCell<Arc<dyn RelayerSdk>>,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
}

impl SdkLifecycle {
    pub fn new(loader: Arc<dyn SdkLoader>) -> Self {
        Self {
            loader,
            load_timeout: Duration::from_secs(DEFAULT_SDK_LOAD_TIMEOUT_SECS),
            sdk: OnceCell::new(),
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
        }
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.sdk.initialized()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// The loaded SDK, if `load()` has succeeded
    pub fn sdk(&self) -> Option<Arc<dyn RelayerSdk>> {
        self.sdk.get().cloned()
    }

    pub async fn load(&self) -> Result<Arc<dyn RelayerSdk>, FhevmError> {
        let sdk = self
            .sdk
            .get_or_try_init(|| async {
                debug!("Loading relayer SDK");
                match tokio::time::timeout(self.load_timeout, self.loader.load()).await {
                    Ok(Ok(sdk)) => {
                        info!("📦 Relayer SDK loaded");
                        Ok(sdk)
                    }
                    Ok(Err(e)) if e.is_network() => Err(e),
                    Ok(Err(FhevmError::SdkLoad(reason))) => Err(FhevmError::SdkLoad(reason)),
                    Ok(Err(other)) => Err(FhevmError::SdkLoad(other.to_string())),
                    Err(_) => Err(FhevmError::SdkLoad(format!(
                        "relayer SDK did not become available within {}s",
                        self.load_timeout.as_secs()
                    ))),
                }
            })
            .await?;
        Ok(sdk.clone())
    }

    pub async fn init(&self, options: &SdkInitOptions) -> Result<(), FhevmError> {
        if self.is_initialized() {
            return Ok(());
        }

        let sdk = self
            .sdk()
            .ok_or_else(|| FhevmError::SdkLoad("relayer SDK is not available".to_string()))?;

        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }

        let result = match sdk.init_sdk(options).await {
            Ok(result) => result,
            Err(e) if e.is_network() => return Err(e),
            Err(FhevmError::SdkInit(reason)) => return Err(FhevmError::SdkInit(reason)),
            Err(other) => return Err(FhevmError::SdkInit(other.to_string())),
        };

        self.initialized.store(result, Ordering::Release);
        if !result {
            return Err(FhevmError::SdkInit("initSDK failed".to_string()));
        }

        info!("🔐 Relayer SDK initialized");
        Ok(())
    }
}
