// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Known local development chains
//!
//! A chain id found here is treated as a mock (development) network. Hardhat's
//! default chain is always present; caller entries are merged on top and win on
//! collision.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hardhat's default chain id
pub const HARDHAT_CHAIN_ID: u64 = 31337;

/// Hardhat's default JSON-RPC endpoint
pub const HARDHAT_RPC_URL: &str = "http://localhost:8545";

/// Chain id to RPC URL mapping for development networks
///
/// Deserialized maps go through [`MockChains::with_overrides`], so Hardhat's
/// entry survives unless the map overrides it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<u64, String>",
    into = "BTreeMap<u64, String>"
)]
pub struct MockChains {
    chains: BTreeMap<u64, String>,
}

impl MockChains {
    /// Built-in defaults only
    pub fn new() -> Self {
        let mut chains = BTreeMap::new();
        chains.insert(HARDHAT_CHAIN_ID, HARDHAT_RPC_URL.to_string());
        Self { chains }
    }

    /// Defaults merged with `overrides`; overrides win
    pub fn with_overrides<I, S>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        let mut mock_chains = Self::new();
        for (chain_id, url) in overrides {
            mock_chains.chains.insert(chain_id, url.into());
        }
        mock_chains
    }

    pub fn insert(&mut self, chain_id: u64, rpc_url: impl Into<String>) {
        self.chains.insert(chain_id, rpc_url.into());
    }

    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.chains.get(&chain_id).map(String::as_str)
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.chains.contains_key(&chain_id)
    }

    /// Entries in ascending chain id order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> {
        self.chains.iter().map(|(id, url)| (*id, url.as_str()))
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Parse `31337=http://localhost:8545,1337=http://127.0.0.1:7545`
    pub fn parse_overrides(value: &str) -> Result<Vec<(u64, String)>, String> {
        value.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (id, url) = entry
                    .split_once('=')
                    .ok_or_else(|| format!("expected <chain_id>=<url>, got '{}'", entry))?;
                let chain_id = id
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| format!("invalid chain id '{}': {}", id.trim(), e))?;
                Ok((chain_id, url.trim().to_string()))
            })
            .collect()
    }
}

impl Default for MockChains {
    fn default() -> Self {
        Self::new()
    }
}

impl From<BTreeMap<u64, String>> for MockChains {
    fn from(overrides: BTreeMap<u64, String>) -> Self {
        Self::with_overrides(overrides)
    }
}

impl From<MockChains> for BTreeMap<u64, String> {
    fn from(mock_chains: MockChains) -> Self {
        mock_chains.chains
    }
}
