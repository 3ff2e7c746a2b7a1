// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::Address;
use fhevm_session::error::FhevmError;
use fhevm_session::network::{Eip1193Provider, RpcConnector, RpcError};
use fhevm_session::sdk::instance::{
    ClearValue, Eip712Domain, Eip712TypedData, EncryptInput, EncryptedInput, FhevmInstance,
    FhevmInstanceConfig, Keypair, UserDecryptRequest,
};
use fhevm_session::sdk::lifecycle::{RelayerSdk, SdkInitOptions};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACL_ADDRESS: &str = "0x50157CFfD6bBFA2DECe204a89ec419c23ef5755D";
pub const INPUT_VERIFIER_ADDRESS: &str = "0x901F8942346f7AB3a01F6D7613119Bca447Bb030";
pub const KMS_VERIFIER_ADDRESS: &str = "0x1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC";

/// One scripted reply per method
#[derive(Clone)]
pub enum Reply {
    Ok(Value),
    Err(RpcError),
    /// Reply after the delay
    Delayed(Duration, Value),
    Hang,
}

#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, method: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), reply);
        self
    }

    pub fn set_reply(&self, method: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), reply);
    }

    /// Hardhat node with FHEVM relayer metadata
    pub fn hardhat(chain_id: u64) -> Self {
        Self::new()
            .reply("eth_chainId", Reply::Ok(json!(format!("0x{:x}", chain_id))))
            .reply(
                "web3_clientVersion",
                Reply::Ok(json!("HardhatNetwork/2.22.0/@ethereumjs/vm/7.0.0")),
            )
            .reply("fhevm_relayer_metadata", Reply::Ok(relayer_metadata()))
    }

    /// Non-Hardhat node
    pub fn geth(chain_id: u64) -> Self {
        Self::new()
            .reply("eth_chainId", Reply::Ok(json!(format!("0x{:x}", chain_id))))
            .reply("web3_clientVersion", Reply::Ok(json!("Geth/v1.13.5-stable/linux-amd64")))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }
}

#[async_trait]
impl Eip1193Provider for ScriptedProvider {
    async fn request(&self, method: &str, _params: Value) -> Result<Value, RpcError> {
        self.calls.lock().unwrap().push(method.to_string());
        let reply = self.replies.lock().unwrap().get(method).cloned();
        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Err(err)) => Err(err),
            Some(Reply::Delayed(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Reply::Hang) => futures::future::pending().await,
            None => Err(RpcError::JsonRpc {
                code: -32601,
                message: format!("the method {} does not exist/is not available", method),
            }),
        }
    }
}

pub fn relayer_metadata() -> Value {
    json!({
        "ACLAddress": ACL_ADDRESS,
        "InputVerifierAddress": INPUT_VERIFIER_ADDRESS,
        "KMSVerifierAddress": KMS_VERIFIER_ADDRESS,
    })
}

/// Connector serving scripted providers by URL; unknown URLs refuse connections
#[derive(Default)]
pub struct ScriptedConnector {
    nodes: Mutex<HashMap<String, Arc<ScriptedProvider>>>,
    connects: AtomicUsize,
}

struct Unreachable;

#[async_trait]
impl Eip1193Provider for Unreachable {
    async fn request(&self, _method: &str, _params: Value) -> Result<Value, RpcError> {
        Err(RpcError::Transport("connection refused".to_string()))
    }
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(self, url: &str, node: ScriptedProvider) -> Self {
        self.add_node(url, Arc::new(node));
        self
    }

    pub fn add_node(&self, url: &str, node: Arc<ScriptedProvider>) {
        self.nodes.lock().unwrap().insert(url.to_string(), node);
    }

    pub fn node(&self, url: &str) -> Option<Arc<ScriptedProvider>> {
        self.nodes.lock().unwrap().get(url).cloned()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl RpcConnector for ScriptedConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn Eip1193Provider>, RpcError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.nodes.lock().unwrap().get(url) {
            Some(node) => Ok(node.clone() as Arc<dyn Eip1193Provider>),
            None => Ok(Arc::new(Unreachable)),
        }
    }
}

/// Instance returned by [`FakeSdk`]
pub struct FakeInstance {
    pub config: FhevmInstanceConfig,
    pub public_key: Option<Vec<u8>>,
    pub public_params: Option<Vec<u8>>,
}

#[async_trait]
impl FhevmInstance for FakeInstance {
    async fn encrypt(&self, input: EncryptInput) -> Result<EncryptedInput, FhevmError> {
        Ok(EncryptedInput {
            handles: input.values.iter().map(|_| [7u8; 32]).collect(),
            input_proof: vec![input.values.len() as u8],
        })
    }

    async fn user_decrypt(
        &self,
        _request: UserDecryptRequest,
    ) -> Result<HashMap<String, ClearValue>, FhevmError> {
        Ok(HashMap::new())
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        self.public_key.clone()
    }

    fn public_params(&self, _bits: u32) -> Option<Vec<u8>> {
        self.public_params.clone()
    }

    fn generate_keypair(&self) -> Keypair {
        Keypair {
            public_key: "0x01".to_string(),
            private_key: "0x02".to_string(),
        }
    }

    fn create_eip712(
        &self,
        _public_key: &str,
        _contract_addresses: &[Address],
        _start_timestamp: u64,
        _duration_days: u64,
    ) -> Eip712TypedData {
        Eip712TypedData {
            domain: Eip712Domain {
                name: "Decryption".to_string(),
                version: "1".to_string(),
                chain_id: self.config.chain_id,
                verifying_contract: self.config.kms_contract_address.clone(),
            },
            primary_type: "UserDecryptRequestVerification".to_string(),
            types: BTreeMap::new(),
            message: json!({}),
        }
    }
}

/// Relayer SDK fake that records every call
pub struct FakeSdk {
    acl_address: String,
    init_result: bool,
    init_delay: Duration,
    create_delay: Duration,
    instance_key: Option<(Vec<u8>, Vec<u8>)>,
    init_calls: AtomicUsize,
    created: Mutex<Vec<FhevmInstanceConfig>>,
}

impl FakeSdk {
    pub fn new() -> Self {
        Self {
            acl_address: ACL_ADDRESS.to_string(),
            init_result: true,
            init_delay: Duration::ZERO,
            create_delay: Duration::ZERO,
            instance_key: Some((vec![1, 2, 3], vec![4, 5, 6])),
            init_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn with_acl_address(mut self, acl_address: &str) -> Self {
        self.acl_address = acl_address.to_string();
        self
    }

    pub fn with_init_result(mut self, result: bool) -> Self {
        self.init_result = result;
        self
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub fn with_instance_key(mut self, key: Option<(Vec<u8>, Vec<u8>)>) -> Self {
        self.instance_key = key;
        self
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<FhevmInstanceConfig> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayerSdk for FakeSdk {
    async fn init_sdk(&self, _options: &SdkInitOptions) -> Result<bool, FhevmError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        Ok(self.init_result)
    }

    fn production_config(&self) -> FhevmInstanceConfig {
        FhevmInstanceConfig {
            acl_contract_address: self.acl_address.clone(),
            kms_contract_address: KMS_VERIFIER_ADDRESS.to_string(),
            input_verifier_contract_address: INPUT_VERIFIER_ADDRESS.to_string(),
            verifying_contract_address_decryption: "0x5D8BD78e2ea6bbE41f26dFe9fdaEAa349e077478"
                .to_string(),
            verifying_contract_address_input_verification:
                "0x483b9dE06E4E4C7D35CCf5837A1668487406D955".to_string(),
            chain_id: 11155111,
            gateway_chain_id: 55815,
            relayer_url: "https://relayer.testnet.zama.cloud".to_string(),
            ..FhevmInstanceConfig::default()
        }
    }

    async fn create_instance(
        &self,
        config: FhevmInstanceConfig,
    ) -> Result<Arc<dyn FhevmInstance>, FhevmError> {
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        self.created.lock().unwrap().push(config.clone());
        let (public_key, public_params) = match &self.instance_key {
            Some((key, params)) => (Some(key.clone()), Some(params.clone())),
            None => (None, None),
        };
        Ok(Arc::new(FakeInstance {
            config,
            public_key,
            public_params,
        }))
    }
}
