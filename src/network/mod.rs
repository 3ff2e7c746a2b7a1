// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod metadata;
pub mod provider_select;
pub mod resolver;
pub mod rpc;

pub use metadata::{is_address, MetadataProbe, RelayerMetadata};
pub use provider_select::ProviderCandidates;
pub use resolver::{EndpointResolver, Resolution};
pub use rpc::{Eip1193Provider, HttpConnector, ProviderHandle, RpcConnector, RpcError};
