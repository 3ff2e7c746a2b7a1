// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Instance construction
//!
//! ## Paths
//!
//! - **Mock**: the provider resolves to a development chain and the node
//!   serves FHEVM relayer metadata. A local instance is built directly; the SDK
//!   is never loaded and the key cache is not touched.
//! - **Production**: load and initialize the relayer SDK (once per process),
//!   look up cached public key material, create the instance, then write the
//!   instance's key material back to the cache.
//!
//! ## Cancellation
//!
//! The token is checked on both sides of every await. Once cancelled, a build
//! emits no further phases and never writes to the key cache.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::chains::MockChains;
use crate::config::settings::SessionConfig;
use crate::error::FhevmError;
use crate::network::metadata::{is_address, MetadataProbe};
use crate::network::resolver::{EndpointResolver, Resolution};
use crate::network::rpc::{ProviderHandle, RpcConnector};
use crate::sdk::instance::{FhevmInstance, FhevmInstanceConfig};
use crate::sdk::lifecycle::{SdkInitOptions, SdkLifecycle};
use crate::sdk::mock::{LocalMockFactory, MockInstanceFactory};
use crate::storage::public_key_store::PublicKeyStore;

/// Progress notifications emitted while a build runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    SdkLoading,
    SdkLoaded,
    SdkInitializing,
    SdkInitialized,
    Creating,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::SdkLoading => "sdk-loading",
            BuildPhase::SdkLoaded => "sdk-loaded",
            BuildPhase::SdkInitializing => "sdk-initializing",
            BuildPhase::SdkInitialized => "sdk-initialized",
            BuildPhase::Creating => "creating",
        }
    }
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn ensure_active(token: &CancellationToken) -> Result<(), FhevmError> {
    if token.is_cancelled() {
        Err(FhevmError::Aborted)
    } else {
        Ok(())
    }
}

pub struct InstanceBuilder {
    resolver: EndpointResolver,
    probe: MetadataProbe,
    lifecycle: Arc<SdkLifecycle>,
    key_store: PublicKeyStore,
    mock_factory: Arc<dyn MockInstanceFactory>,
    init_options: SdkInitOptions,
    public_params_size: u32,
}

impl InstanceBuilder {
    pub fn new(
        connector: Arc<dyn RpcConnector>,
        lifecycle: Arc<SdkLifecycle>,
        key_store: PublicKeyStore,
    ) -> Self {
        Self::from_config(&SessionConfig::default(), connector, lifecycle, key_store)
    }

    pub fn from_config(
        config: &SessionConfig,
        connector: Arc<dyn RpcConnector>,
        lifecycle: Arc<SdkLifecycle>,
        key_store: PublicKeyStore,
    ) -> Self {
        Self {
            resolver: EndpointResolver::new(connector.clone()).with_timeout(config.rpc_timeout),
            probe: MetadataProbe::new(connector)
                .with_timeout(config.rpc_timeout)
                .with_marker(config.client_version_marker.clone()),
            lifecycle,
            key_store,
            mock_factory: Arc::new(LocalMockFactory),
            init_options: SdkInitOptions::default(),
            public_params_size: config.public_params_size,
        }
    }

    pub fn with_mock_factory(mut self, factory: Arc<dyn MockInstanceFactory>) -> Self {
        self.mock_factory = factory;
        self
    }

    pub fn with_init_options(mut self, options: SdkInitOptions) -> Self {
        self.init_options = options;
        self
    }

    pub fn lifecycle(&self) -> &Arc<SdkLifecycle> {
        &self.lifecycle
    }

    pub fn key_store(&self) -> &PublicKeyStore {
        &self.key_store
    }

    pub async fn build(
        &self,
        provider: &ProviderHandle,
        mock_chains: &MockChains,
        token: &CancellationToken,
        on_phase: &(dyn Fn(BuildPhase) + Send + Sync),
    ) -> Result<Arc<dyn FhevmInstance>, FhevmError> {
        let notify = |phase: BuildPhase| {
            if !token.is_cancelled() {
                on_phase(phase);
            }
        };

        ensure_active(token)?;

        let resolution = match self.resolver.resolve(provider, mock_chains).await {
            Ok(resolution) => resolution,
            Err(e) if e.is_network() => {
                debug!("Endpoint resolution failed ({}), trying the SDK path", e);
                Resolution::Generic {
                    chain_id: 0,
                    rpc_url: provider.url().map(str::to_string),
                }
            }
            Err(e) => return Err(e),
        };
        ensure_active(token)?;

        if let Resolution::Mock { chain_id, rpc_url } = &resolution {
            info!(
                chain_id = *chain_id,
                rpc_url = %rpc_url,
                "Detected mock chain, probing for Hardhat FHEVM metadata"
            );

            match self.probe.probe(rpc_url).await {
                Some(metadata) => {
                    ensure_active(token)?;
                    info!(
                        chain_id = *chain_id,
                        acl = ?metadata.acl_address,
                        "Hardhat FHEVM metadata found, using mock instance"
                    );
                    notify(BuildPhase::Creating);
                    let instance = self.mock_factory.create(rpc_url, *chain_id, metadata).await?;
                    ensure_active(token)?;
                    info!(chain_id = *chain_id, "✅ Mock FHEVM instance created");
                    return Ok(instance);
                }
                None => {
                    warn!(
                        chain_id = *chain_id,
                        rpc_url = %rpc_url,
                        "Hardhat FHEVM metadata not found, falling back to the relayer SDK"
                    );
                }
            }
        }

        ensure_active(token)?;

        if !self.lifecycle.is_loaded() {
            notify(BuildPhase::SdkLoading);
            self.lifecycle.load().await?;
            ensure_active(token)?;
            notify(BuildPhase::SdkLoaded);
        }

        if !self.lifecycle.is_initialized() {
            notify(BuildPhase::SdkInitializing);
            self.lifecycle.init(&self.init_options).await?;
            ensure_active(token)?;
            notify(BuildPhase::SdkInitialized);
        }

        let sdk = self
            .lifecycle
            .sdk()
            .ok_or_else(|| FhevmError::SdkLoad("relayer SDK is not available".to_string()))?;

        let production = sdk.production_config();
        let acl_address = production.acl_contract_address.clone();
        if !is_address(&acl_address) {
            return Err(FhevmError::InvalidAddress(acl_address));
        }

        let cached = match self.key_store.get(&acl_address).await {
            Ok(data) => Some(data),
            Err(e) => {
                debug!(acl = %acl_address, "No usable cached public key: {}", e);
                None
            }
        };
        ensure_active(token)?;

        let (public_key, public_params) = match cached {
            Some(data) => (Some(data.public_key), Some(data.public_params)),
            None => (None, None),
        };
        let config = FhevmInstanceConfig {
            network: Some(provider.clone()),
            public_key,
            public_params,
            ..production
        };

        notify(BuildPhase::Creating);
        let instance = sdk.create_instance(config).await?;
        ensure_active(token)?;

        match (
            instance.public_key(),
            instance.public_params(self.public_params_size),
        ) {
            (Some(public_key), Some(public_params)) => {
                self.key_store
                    .set(&acl_address, &public_key, &public_params)
                    .await;
            }
            _ => debug!(acl = %acl_address, "Instance exposes no public key material"),
        }
        ensure_active(token)?;

        info!(
            chain_id = resolution.chain_id(),
            acl = %acl_address,
            "✅ FHEVM instance created"
        );
        Ok(instance)
    }
}
