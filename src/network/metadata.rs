// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Hardhat FHEVM node detection
//!
//! A Hardhat node running the FHEVM plugin answers `fhevm_relayer_metadata`
//! with the addresses of its ACL, input verifier and KMS verifier contracts.
//! Absence of that metadata is normal (plain Hardhat, Anvil, Ganache) and is
//! never an error.

use ethers::types::Address;
use regex::Regex;
use serde_json::Value;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

use super::rpc::{request_once, RpcConnector};
use crate::config::settings::{DEFAULT_CLIENT_VERSION_MARKER, DEFAULT_RPC_TIMEOUT_SECS};

pub const CLIENT_VERSION_METHOD: &str = "web3_clientVersion";
pub const RELAYER_METADATA_METHOD: &str = "fhevm_relayer_metadata";

/// Verifying contracts exposed by a development node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayerMetadata {
    pub acl_address: Address,
    pub input_verifier_address: Address,
    pub kms_verifier_address: Address,
}

static ADDRESS_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// `0x` followed by exactly 40 hex digits
pub fn is_address(value: &str) -> bool {
    ADDRESS_RE
        .get_or_init(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").ok())
        .as_ref()
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

pub struct MetadataProbe {
    connector: Arc<dyn RpcConnector>,
    request_timeout: Duration,
    marker: String,
}

impl MetadataProbe {
    pub fn new(connector: Arc<dyn RpcConnector>) -> Self {
        Self {
            connector,
            request_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            marker: DEFAULT_CLIENT_VERSION_MARKER.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Substring expected in the client version, matched case-insensitively
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into().to_lowercase();
        self
    }

    pub async fn probe(&self, rpc_url: &str) -> Option<RelayerMetadata> {
        let version = match request_once(
            self.connector.as_ref(),
            rpc_url,
            CLIENT_VERSION_METHOD,
            Value::Array(vec![]),
            self.request_timeout,
        )
        .await
        {
            Ok(version) => version,
            Err(e) => {
                debug!(
                    rpc_url = %rpc_url,
                    "Could not query client version ({}), normal if the node is not running", e
                );
                return None;
            }
        };

        match version.as_str() {
            Some(v) if v.to_lowercase().contains(&self.marker) => {}
            _ => {
                debug!(rpc_url = %rpc_url, version = %version, "Not an FHEVM development node");
                return None;
            }
        }

        let metadata = match request_once(
            self.connector.as_ref(),
            rpc_url,
            RELAYER_METADATA_METHOD,
            Value::Array(vec![]),
            self.request_timeout,
        )
        .await
        {
            Ok(metadata) => metadata,
            Err(e) if e.is_network() => {
                debug!(rpc_url = %rpc_url, "Could not fetch relayer metadata: {}", e);
                return None;
            }
            Err(e) => {
                debug!(rpc_url = %rpc_url, "Relayer metadata not available: {}", e);
                return None;
            }
        };

        let parsed = parse_metadata(&metadata);
        if parsed.is_none() {
            debug!(rpc_url = %rpc_url, "Relayer metadata is incomplete: {}", metadata);
        }
        parsed
    }
}

/// All three addresses must be present, string-typed and address-shaped
pub fn parse_metadata(value: &Value) -> Option<RelayerMetadata> {
    let object = value.as_object()?;
    let field = |name: &str| -> Option<Address> {
        let raw = object.get(name)?.as_str()?;
        if !is_address(raw) {
            return None;
        }
        Address::from_str(raw).ok()
    };

    Some(RelayerMetadata {
        acl_address: field("ACLAddress")?,
        input_verifier_address: field("InputVerifierAddress")?,
        kms_verifier_address: field("KMSVerifierAddress")?,
    })
}
