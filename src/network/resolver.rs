// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Endpoint resolution
//!
//! Works out which chain a provider talks to and whether that chain is a local
//! development network. Local nodes are often unreachable for a moment during
//! hot reload, so a transport failure on a URL that looks local still resolves
//! to a mock chain. A protocol error never does.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::rpc::{request_once, request_with_timeout, ProviderHandle, RpcConnector, RpcError};
use crate::config::chains::{MockChains, HARDHAT_CHAIN_ID};
use crate::config::settings::DEFAULT_RPC_TIMEOUT_SECS;
use crate::error::FhevmError;

/// Outcome of endpoint resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Development network; the RPC URL is always known
    Mock { chain_id: u64, rpc_url: String },
    Generic { chain_id: u64, rpc_url: Option<String> },
}

impl Resolution {
    pub fn is_mock(&self) -> bool {
        matches!(self, Resolution::Mock { .. })
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Resolution::Mock { chain_id, .. } | Resolution::Generic { chain_id, .. } => *chain_id,
        }
    }

    pub fn rpc_url(&self) -> Option<&str> {
        match self {
            Resolution::Mock { rpc_url, .. } => Some(rpc_url.as_str()),
            Resolution::Generic { rpc_url, .. } => rpc_url.as_deref(),
        }
    }
}

pub struct EndpointResolver {
    connector: Arc<dyn RpcConnector>,
    request_timeout: Duration,
}

impl EndpointResolver {
    pub fn new(connector: Arc<dyn RpcConnector>) -> Self {
        Self {
            connector,
            request_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn resolve(
        &self,
        provider: &ProviderHandle,
        mock_chains: &MockChains,
    ) -> Result<Resolution, FhevmError> {
        match self.chain_id(provider).await {
            Ok(chain_id) => {
                let explicit_url = provider.url().map(str::to_string);
                if let Some(mapped) = mock_chains.get(chain_id) {
                    let rpc_url = explicit_url.unwrap_or_else(|| mapped.to_string());
                    debug!(chain_id, rpc_url = %rpc_url, "Resolved mock chain");
                    Ok(Resolution::Mock { chain_id, rpc_url })
                } else {
                    debug!(chain_id, "Resolved production chain");
                    Ok(Resolution::Generic {
                        chain_id,
                        rpc_url: explicit_url,
                    })
                }
            }
            Err(err) if err.is_network() => match provider.url() {
                Some(url) => match match_mock_url(url, mock_chains) {
                    Some(resolution) => {
                        info!(
                            chain_id = resolution.chain_id(),
                            rpc_url = %url,
                            "eth_chainId failed ({}), URL matches a mock chain", err
                        );
                        Ok(resolution)
                    }
                    None => {
                        debug!(rpc_url = %url, "eth_chainId failed: {}", err);
                        Err(FhevmError::ChainIdUnavailable)
                    }
                },
                None => {
                    debug!("eth_chainId failed on provider: {}", err);
                    Err(FhevmError::ChainIdUnavailable)
                }
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn chain_id(&self, provider: &ProviderHandle) -> Result<u64, RpcError> {
        let params = Value::Array(vec![]);
        let raw = match provider {
            ProviderHandle::Url(url) => {
                request_once(
                    self.connector.as_ref(),
                    url,
                    "eth_chainId",
                    params,
                    self.request_timeout,
                )
                .await?
            }
            ProviderHandle::Eip1193(p) => {
                request_with_timeout(p.as_ref(), "eth_chainId", params, self.request_timeout)
                    .await?
            }
        };
        parse_chain_id(&raw)
    }
}

/// Heuristic fallback when `eth_chainId` could not reach `url`
pub fn match_mock_url(url: &str, mock_chains: &MockChains) -> Option<Resolution> {
    for (chain_id, mock_url) in mock_chains.iter() {
        let bare = strip_scheme(mock_url);
        // a bare scheme such as "http://" would otherwise match every URL
        if bare.is_empty() {
            continue;
        }
        if url == mock_url || url.contains(bare) {
            return Some(Resolution::Mock {
                chain_id,
                rpc_url: url.to_string(),
            });
        }
    }

    if is_loopback_url(url) {
        return Some(Resolution::Mock {
            chain_id: HARDHAT_CHAIN_ID,
            rpc_url: url.to_string(),
        });
    }

    None
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url)
}

fn is_loopback_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| host == "localhost" || host == "127.0.0.1")
        .unwrap_or(false)
}

/// `"0x7a69"`, `"31337"` or `31337`
pub fn parse_chain_id(value: &Value) -> Result<u64, RpcError> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => s.parse::<u64>(),
            };
            parsed.map_err(|e| RpcError::InvalidResponse(format!("invalid chain id '{}': {}", s, e)))
        }
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| RpcError::InvalidResponse(format!("invalid chain id {}", n))),
        other => Err(RpcError::InvalidResponse(format!(
            "invalid chain id {}",
            other
        ))),
    }
}
