// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Development instance for Hardhat FHEVM nodes
//!
//! On a local node no relayer or KMS exists, so inputs are not really
//! encrypted. Handles are derived deterministically with keccak256 and the
//! cleartexts are kept in process so `user_decrypt` can answer for handles this
//! instance produced.
//!
//! Handle layout (32 bytes):
//!
//! | bytes  | content                           |
//! |--------|-----------------------------------|
//! | 0..21  | keccak256 of the input commitment |
//! | 21     | index of the value in the input   |
//! | 22..30 | chain id, big-endian              |
//! | 30     | encrypted type code               |
//! | 31     | handle version (0)                |

use async_trait::async_trait;
use ethers::types::Address;
use ethers::utils::to_checksum;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tiny_keccak::{Hasher, Keccak};
use tokio::sync::RwLock;
use tracing::debug;

use super::instance::{
    ClearValue, EncryptInput, EncryptedInput, Eip712Domain, Eip712Field, Eip712TypedData,
    FhevmInstance, Keypair, UserDecryptRequest,
};
use crate::error::FhevmError;
use crate::network::metadata::RelayerMetadata;

/// Builds the lightweight instance used on development nodes
#[async_trait]
pub trait MockInstanceFactory: Send + Sync {
    async fn create(
        &self,
        rpc_url: &str,
        chain_id: u64,
        metadata: RelayerMetadata,
    ) -> Result<Arc<dyn FhevmInstance>, FhevmError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalMockFactory;

#[async_trait]
impl MockInstanceFactory for LocalMockFactory {
    async fn create(
        &self,
        rpc_url: &str,
        chain_id: u64,
        metadata: RelayerMetadata,
    ) -> Result<Arc<dyn FhevmInstance>, FhevmError> {
        Ok(Arc::new(MockFhevmInstance::new(rpc_url, chain_id, metadata)))
    }
}

pub struct MockFhevmInstance {
    rpc_url: String,
    chain_id: u64,
    metadata: RelayerMetadata,
    cleartexts: RwLock<HashMap<[u8; 32], ClearValue>>,
    input_counter: AtomicU64,
}

impl MockFhevmInstance {
    pub fn new(rpc_url: impl Into<String>, chain_id: u64, metadata: RelayerMetadata) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id,
            metadata,
            cleartexts: RwLock::new(HashMap::new()),
            input_counter: AtomicU64::new(0),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn metadata(&self) -> &RelayerMetadata {
        &self.metadata
    }

    fn derive_handle(
        &self,
        input: &EncryptInput,
        counter: u64,
        index: u8,
        value: &ClearValue,
    ) -> [u8; 32] {
        let mut hasher = Keccak::v256();
        hasher.update(self.metadata.acl_address.as_bytes());
        hasher.update(input.contract_address.as_bytes());
        hasher.update(input.user_address.as_bytes());
        hasher.update(&counter.to_be_bytes());
        hasher.update(&value.bits().to_be_bytes());
        hasher.update(&value.to_be_bytes());
        let mut digest = [0u8; 32];
        hasher.finalize(&mut digest);

        let mut handle = [0u8; 32];
        handle[..21].copy_from_slice(&digest[..21]);
        handle[21] = index;
        handle[22..30].copy_from_slice(&self.chain_id.to_be_bytes());
        handle[30] = type_code(value);
        handle[31] = 0;
        handle
    }
}

fn type_code(value: &ClearValue) -> u8 {
    match value {
        ClearValue::Bool(_) => 0,
        ClearValue::U8(_) => 2,
        ClearValue::U16(_) => 3,
        ClearValue::U32(_) => 4,
        ClearValue::U64(_) => 5,
        ClearValue::U128(_) => 6,
        ClearValue::Address(_) => 7,
    }
}

fn parse_handle(handle: &str) -> Result<[u8; 32], FhevmError> {
    let digits = handle.strip_prefix("0x").unwrap_or(handle);
    let bytes = hex::decode(digits)
        .map_err(|e| FhevmError::Instance(format!("invalid handle {}: {}", handle, e)))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| FhevmError::Instance(format!("handle {} is not 32 bytes", handle)))
}

#[async_trait]
impl FhevmInstance for MockFhevmInstance {
    async fn encrypt(&self, input: EncryptInput) -> Result<EncryptedInput, FhevmError> {
        if input.values.is_empty() {
            return Err(FhevmError::Instance("encrypted input is empty".to_string()));
        }
        // the index must fit the single index byte of a handle
        if input.values.len() > usize::from(u8::MAX) {
            return Err(FhevmError::Instance(format!(
                "too many values in one input: {}",
                input.values.len()
            )));
        }

        let counter = self.input_counter.fetch_add(1, Ordering::Relaxed);
        let mut handles = Vec::with_capacity(input.values.len());
        let mut cleartexts = self.cleartexts.write().await;
        for (index, value) in input.values.iter().enumerate() {
            let handle = self.derive_handle(&input, counter, index as u8, value);
            cleartexts.insert(handle, *value);
            handles.push(handle);
        }
        drop(cleartexts);

        let mut input_proof = Vec::with_capacity(1 + handles.len() * 32);
        input_proof.push(handles.len() as u8);
        for handle in &handles {
            input_proof.extend_from_slice(handle);
        }

        debug!(
            chain_id = self.chain_id,
            count = handles.len(),
            "Created mock encrypted input"
        );
        Ok(EncryptedInput {
            handles,
            input_proof,
        })
    }

    async fn user_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<HashMap<String, ClearValue>, FhevmError> {
        if request.duration_days == 0 {
            return Err(FhevmError::Instance(
                "durationDays must be greater than zero".to_string(),
            ));
        }
        if request.signature.trim().is_empty() {
            return Err(FhevmError::Instance("missing signature".to_string()));
        }

        let cleartexts = self.cleartexts.read().await;
        let mut results = HashMap::with_capacity(request.pairs.len());
        for pair in &request.pairs {
            if !request.contract_addresses.contains(&pair.contract_address) {
                return Err(FhevmError::Instance(format!(
                    "contract {} is not part of the signed request",
                    to_checksum(&pair.contract_address, None)
                )));
            }
            let handle = parse_handle(&pair.handle)?;
            let value = cleartexts.get(&handle).ok_or_else(|| {
                FhevmError::Instance(format!("unknown handle {}", pair.handle))
            })?;
            results.insert(format!("0x{}", hex::encode(handle)), *value);
        }
        Ok(results)
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        None
    }

    fn public_params(&self, _bits: u32) -> Option<Vec<u8>> {
        None
    }

    fn generate_keypair(&self) -> Keypair {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = signing_key.verifying_key().to_encoded_point(true);
        Keypair {
            public_key: format!("0x{}", hex::encode(public_key.as_bytes())),
            private_key: format!("0x{}", hex::encode(signing_key.to_bytes())),
        }
    }

    fn create_eip712(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Eip712TypedData {
        let mut types = BTreeMap::new();
        types.insert(
            "EIP712Domain".to_string(),
            vec![
                Eip712Field::new("name", "string"),
                Eip712Field::new("version", "string"),
                Eip712Field::new("chainId", "uint256"),
                Eip712Field::new("verifyingContract", "address"),
            ],
        );
        types.insert(
            "UserDecryptRequestVerification".to_string(),
            vec![
                Eip712Field::new("publicKey", "bytes"),
                Eip712Field::new("contractAddresses", "address[]"),
                Eip712Field::new("startTimestamp", "uint256"),
                Eip712Field::new("durationDays", "uint256"),
            ],
        );

        let addresses: Vec<String> = contract_addresses
            .iter()
            .map(|a| to_checksum(a, None))
            .collect();

        Eip712TypedData {
            domain: Eip712Domain {
                name: "Decryption".to_string(),
                version: "1".to_string(),
                chain_id: self.chain_id,
                verifying_contract: to_checksum(&self.metadata.kms_verifier_address, None),
            },
            primary_type: "UserDecryptRequestVerification".to_string(),
            types,
            message: json!({
                "publicKey": public_key,
                "contractAddresses": addresses,
                "startTimestamp": start_timestamp.to_string(),
                "durationDays": duration_days.to_string(),
            }),
        }
    }
}
