// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for session resolution and instance construction
//!
//! Errors fall into two families that the session controller treats
//! differently:
//!
//! - **Network class** (`Network`, `Timeout`, `ChainIdUnavailable`): the
//!   endpoint is not reachable yet. The controller reports `Idle`.
//! - **Everything else**: a genuine failure (SDK missing, bad configuration,
//!   instance creation refused). The controller reports `Error`.
//!
//! `Aborted` is never surfaced; it marks a superseded build.

use thiserror::Error;

use crate::network::rpc::RpcError;

/// Errors produced while resolving an endpoint or building an instance
#[derive(Debug, Clone, Error)]
pub enum FhevmError {
    /// Transport-level failure (connection refused, DNS, TLS, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// An RPC call did not answer in time
    #[error("RPC request timeout: {method} did not answer within {secs}s")]
    Timeout { method: String, secs: u64 },

    /// The node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node answered with something that could not be interpreted
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    /// The chain id could not be determined and no heuristic matched
    #[error("CHAIN_ID_UNAVAILABLE")]
    ChainIdUnavailable,

    /// The relayer SDK never became available
    #[error("Relayer SDK is not available: {0}")]
    SdkLoad(String),

    /// The relayer SDK one-time setup failed
    #[error("Relayer SDK initialization failed: {0}")]
    SdkInit(String),

    /// A configured contract address is not address-shaped
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The SDK refused to create or operate an instance
    #[error("Instance error: {0}")]
    Instance(String),

    /// Invalid controller or builder configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The build was cancelled
    #[error("FHEVM operation aborted")]
    Aborted,
}

impl FhevmError {
    /// True for failures meaning "not connected yet" rather than misconfiguration
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FhevmError::Network(_) | FhevmError::Timeout { .. } | FhevmError::ChainIdUnavailable
        )
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, FhevmError::Aborted)
    }

    /// Explicit error name reported by the session controller
    pub fn name(&self) -> &'static str {
        match self {
            FhevmError::Network(_) => "NetworkError",
            FhevmError::Timeout { .. } => "TimeoutError",
            FhevmError::Rpc { .. } => "RpcError",
            FhevmError::InvalidResponse(_) => "InvalidResponseError",
            FhevmError::ChainIdUnavailable => "ChainIdUnavailable",
            FhevmError::SdkLoad(_) => "SDKLoadError",
            FhevmError::SdkInit(_) => "SDKInitError",
            FhevmError::InvalidAddress(_) => "InvalidAddressError",
            FhevmError::Instance(_) => "FHEVMInitializationError",
            FhevmError::Config(_) => "ConfigError",
            FhevmError::Aborted => "AbortError",
        }
    }
}

impl From<RpcError> for FhevmError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Transport(msg) => FhevmError::Network(msg),
            RpcError::Timeout { method, secs } => FhevmError::Timeout { method, secs },
            RpcError::JsonRpc { code, message } => FhevmError::Rpc { code, message },
            RpcError::InvalidResponse(msg) => FhevmError::InvalidResponse(msg),
        }
    }
}
