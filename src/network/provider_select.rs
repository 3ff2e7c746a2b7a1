// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Picks the provider handle a session should be built against

use super::rpc::ProviderHandle;
use crate::config::chains::{HARDHAT_CHAIN_ID, HARDHAT_RPC_URL};

/// What the wallet layer currently exposes
#[derive(Debug, Clone, Default)]
pub struct ProviderCandidates {
    /// Chain id the wallet reports, if connected
    pub chain_id: Option<u64>,
    /// Transport of the connected wallet client
    pub wallet: Option<ProviderHandle>,
    /// Provider injected by the host environment
    pub injected: Option<ProviderHandle>,
}

impl ProviderCandidates {
    /// On the local Hardhat chain the node is addressed directly by URL, since
    /// wallet transports do not forward the custom metadata RPC methods.
    pub fn select(&self) -> Option<ProviderHandle> {
        if self.chain_id == Some(HARDHAT_CHAIN_ID) {
            return Some(ProviderHandle::Url(HARDHAT_RPC_URL.to_string()));
        }
        self.wallet.clone().or_else(|| self.injected.clone())
    }
}
