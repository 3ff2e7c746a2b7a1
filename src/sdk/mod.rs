// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Relayer SDK seam
//!
//! - **instance**: the encryption capability handed to callers
//! - **lifecycle**: one-time load and initialization of the SDK
//! - **mock**: the development instance used against Hardhat FHEVM nodes

pub mod instance;
pub mod lifecycle;
pub mod mock;

pub use instance::{
    ClearValue, EncryptInput, EncryptedInput, Eip712TypedData, FhevmInstance,
    FhevmInstanceConfig, HandleContractPair, Keypair, UserDecryptRequest,
};
pub use lifecycle::{
    RelayerSdk, SdkInitOptions, SdkLifecycle, SdkLoader, StaticSdkLoader, UnavailableSdkLoader,
};
pub use mock::{LocalMockFactory, MockFhevmInstance, MockInstanceFactory};
