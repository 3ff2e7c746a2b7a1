// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! JSON-RPC plumbing shared by the resolver and the metadata probe
//!
//! Two ways of talking to a node exist:
//!
//! - an [`Eip1193Provider`] handed in by the caller (wallet transport, injected
//!   provider, or any `ethers` provider), and
//! - a raw URL, for which an [`RpcConnector`] opens a throwaway client that is
//!   dropped as soon as the call returns.

use async_trait::async_trait;
use ethers::providers::{
    Http, JsonRpcClient, Provider, ProviderError, RpcError as EthersRpcError,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Failure of a single JSON-RPC call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    /// Request never reached the node or the connection dropped
    #[error("Failed to fetch: {0}")]
    Transport(String),

    #[error("RPC request timeout: {method} after {secs}s")]
    Timeout { method: String, secs: u64 },

    /// Node answered with a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Transport failures and timeouts; protocol errors are never network class
    pub fn is_network(&self) -> bool {
        matches!(self, RpcError::Transport(_) | RpcError::Timeout { .. })
    }
}

impl From<ProviderError> for RpcError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::JsonRpcClientError(inner) => {
                if let Some(response) = inner.as_error_response() {
                    RpcError::JsonRpc {
                        code: response.code,
                        message: response.message.clone(),
                    }
                } else if inner.as_serde_error().is_some() {
                    RpcError::InvalidResponse(inner.to_string())
                } else {
                    RpcError::Transport(inner.to_string())
                }
            }
            ProviderError::HTTPError(e) => RpcError::Transport(e.to_string()),
            ProviderError::SerdeJson(e) => RpcError::InvalidResponse(e.to_string()),
            other => RpcError::InvalidResponse(other.to_string()),
        }
    }
}

/// Minimal EIP-1193 surface: `request({ method, params })`
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

#[async_trait]
impl<P> Eip1193Provider for Provider<P>
where
    P: JsonRpcClient + 'static,
{
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        Provider::request::<Value, Value>(self, method, params)
            .await
            .map_err(RpcError::from)
    }
}

/// What the session talks to: a caller-owned provider or a plain RPC URL
#[derive(Clone)]
pub enum ProviderHandle {
    Url(String),
    Eip1193(Arc<dyn Eip1193Provider>),
}

impl ProviderHandle {
    pub fn from_provider(provider: Arc<dyn Eip1193Provider>) -> Self {
        ProviderHandle::Eip1193(provider)
    }

    /// The RPC URL, when the handle is a URL
    pub fn url(&self) -> Option<&str> {
        match self {
            ProviderHandle::Url(url) => Some(url.as_str()),
            ProviderHandle::Eip1193(_) => None,
        }
    }
}

/// URLs compare by value, providers by identity
impl PartialEq for ProviderHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ProviderHandle::Url(a), ProviderHandle::Url(b)) => a == b,
            (ProviderHandle::Eip1193(a), ProviderHandle::Eip1193(b)) => {
                std::ptr::eq(
                    Arc::as_ptr(a) as *const (),
                    Arc::as_ptr(b) as *const (),
                )
            }
            _ => false,
        }
    }
}

impl Eq for ProviderHandle {}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderHandle::Url(url) => f.debug_tuple("Url").field(url).finish(),
            ProviderHandle::Eip1193(p) => {
                write!(f, "Eip1193({:p})", Arc::as_ptr(p) as *const ())
            }
        }
    }
}

impl From<&str> for ProviderHandle {
    fn from(url: &str) -> Self {
        ProviderHandle::Url(url.to_string())
    }
}

impl From<String> for ProviderHandle {
    fn from(url: String) -> Self {
        ProviderHandle::Url(url)
    }
}

impl From<Arc<dyn Eip1193Provider>> for ProviderHandle {
    fn from(provider: Arc<dyn Eip1193Provider>) -> Self {
        ProviderHandle::Eip1193(provider)
    }
}

/// Opens short-lived JSON-RPC clients for raw URLs
pub trait RpcConnector: Send + Sync {
    fn connect(&self, url: &str) -> Result<Arc<dyn Eip1193Provider>, RpcError>;
}

/// `ethers` HTTP provider over a shared `reqwest` client
#[derive(Clone, Default)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl RpcConnector for HttpConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn Eip1193Provider>, RpcError> {
        let parsed = Url::parse(url)
            .map_err(|e| RpcError::InvalidResponse(format!("invalid RPC URL {}: {}", url, e)))?;
        let http = Http::new_with_client(parsed, self.client.clone());
        Ok(Arc::new(Provider::new(http)))
    }
}

/// Issue one request, failing with [`RpcError::Timeout`] past `timeout`
pub async fn request_with_timeout(
    provider: &dyn Eip1193Provider,
    method: &str,
    params: Value,
    timeout: Duration,
) -> Result<Value, RpcError> {
    match tokio::time::timeout(timeout, provider.request(method, params)).await {
        Ok(result) => result,
        Err(_) => Err(RpcError::Timeout {
            method: method.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Open a client for `url`, issue one request, then drop the client
pub async fn request_once(
    connector: &dyn RpcConnector,
    url: &str,
    method: &str,
    params: Value,
    timeout: Duration,
) -> Result<Value, RpcError> {
    let client = connector.connect(url)?;
    let result = request_with_timeout(client.as_ref(), method, params, timeout).await;
    drop(client);
    result
}
