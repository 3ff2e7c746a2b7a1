// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encryption instance capability
//!
//! An instance encrypts inputs for a specific contract/user pair and decrypts
//! handles the user is allowed to read. The session engine never looks inside
//! an instance; it only creates, stores and replaces them.

use async_trait::async_trait;
use ethers::types::Address;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::error::FhevmError;
use crate::network::rpc::ProviderHandle;

/// Plaintext value of one of the supported encrypted types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClearValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Address(Address),
}

impl ClearValue {
    /// Bit width of the encrypted type
    pub fn bits(&self) -> u16 {
        match self {
            ClearValue::Bool(_) => 2,
            ClearValue::U8(_) => 8,
            ClearValue::U16(_) => 16,
            ClearValue::U32(_) => 32,
            ClearValue::U64(_) => 64,
            ClearValue::U128(_) => 128,
            ClearValue::Address(_) => 160,
        }
    }

    pub fn to_be_bytes(&self) -> Vec<u8> {
        match self {
            ClearValue::Bool(b) => vec![u8::from(*b)],
            ClearValue::U8(v) => v.to_be_bytes().to_vec(),
            ClearValue::U16(v) => v.to_be_bytes().to_vec(),
            ClearValue::U32(v) => v.to_be_bytes().to_vec(),
            ClearValue::U64(v) => v.to_be_bytes().to_vec(),
            ClearValue::U128(v) => v.to_be_bytes().to_vec(),
            ClearValue::Address(a) => a.as_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncryptInput {
    pub contract_address: Address,
    pub user_address: Address,
    pub values: Vec<ClearValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handles: Vec<[u8; 32]>,
    pub input_proof: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleContractPair {
    /// `0x`-prefixed 32-byte handle
    pub handle: String,
    pub contract_address: Address,
}

#[derive(Debug, Clone)]
pub struct UserDecryptRequest {
    pub pairs: Vec<HandleContractPair>,
    pub private_key: String,
    pub public_key: String,
    pub signature: String,
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypair {
    pub public_key: String,
    pub private_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eip712Field {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Eip712Field {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712TypedData {
    pub domain: Eip712Domain,
    pub primary_type: String,
    pub types: BTreeMap<String, Vec<Eip712Field>>,
    pub message: Value,
}

/// Everything the SDK needs to create a production instance
#[derive(Debug, Clone, Default)]
pub struct FhevmInstanceConfig {
    pub acl_contract_address: String,
    pub kms_contract_address: String,
    pub input_verifier_contract_address: String,
    pub verifying_contract_address_decryption: String,
    pub verifying_contract_address_input_verification: String,
    pub chain_id: u64,
    pub gateway_chain_id: u64,
    pub relayer_url: String,
    pub network: Option<ProviderHandle>,
    pub public_key: Option<Vec<u8>>,
    pub public_params: Option<Vec<u8>>,
}

#[async_trait]
pub trait FhevmInstance: Send + Sync {
    async fn encrypt(&self, input: EncryptInput) -> Result<EncryptedInput, FhevmError>;

    /// Cleartexts keyed by the `0x` handle string
    async fn user_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<HashMap<String, ClearValue>, FhevmError>;

    fn public_key(&self) -> Option<Vec<u8>>;

    fn public_params(&self, bits: u32) -> Option<Vec<u8>>;

    fn generate_keypair(&self) -> Keypair;

    fn create_eip712(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Eip712TypedData;
}
