// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod error;
pub mod network;
pub mod sdk;
pub mod session;
pub mod storage;
pub mod version;

pub use config::{MockChains, SessionConfig, HARDHAT_CHAIN_ID, HARDHAT_RPC_URL};
pub use error::FhevmError;
pub use network::{
    EndpointResolver, Eip1193Provider, HttpConnector, MetadataProbe, ProviderCandidates,
    ProviderHandle, RelayerMetadata, Resolution, RpcConnector, RpcError,
};
pub use sdk::{
    FhevmInstance, FhevmInstanceConfig, LocalMockFactory, MockFhevmInstance, RelayerSdk,
    SdkInitOptions, SdkLifecycle, SdkLoader,
};
pub use session::{
    BuildPhase, ControllerOptions, InstanceBuilder, SessionController, SessionError,
    SessionSnapshot, SessionStatus,
};
pub use storage::{GenericStringStorage, PublicKeyData, PublicKeyStore, StorageMedium};
