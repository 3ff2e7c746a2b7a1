// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod chains;
pub mod settings;

pub use chains::{MockChains, HARDHAT_CHAIN_ID, HARDHAT_RPC_URL};
pub use settings::{ConfigError, SessionConfig};
