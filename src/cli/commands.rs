// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{MockChains, SessionConfig};
use crate::network::{EndpointResolver, HttpConnector, MetadataProbe, ProviderHandle, Resolution};
use crate::sdk::lifecycle::{SdkLifecycle, UnavailableSdkLoader};
use crate::session::{ControllerOptions, InstanceBuilder, SessionController, SessionStatus};
use crate::storage::{FileMedium, MemoryMedium, PublicKeyStore, StorageMedium};

/// Arguments for the resolve command
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// RPC URL to resolve
    #[arg(long, env = "FHEVM_RPC_URL")]
    pub rpc_url: String,

    /// Extra mock chain as <chain_id>=<url>; repeatable
    #[arg(long = "mock-chain")]
    pub mock_chains: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Arguments for the probe command
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// RPC URL of the development node
    #[arg(long, env = "FHEVM_RPC_URL")]
    pub rpc_url: String,

    /// Substring expected in web3_clientVersion
    #[arg(long)]
    pub marker: Option<String>,
}

/// Arguments for the session command
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// RPC URL the session is bound to
    #[arg(long, env = "FHEVM_RPC_URL")]
    pub rpc_url: String,

    /// TOML settings file; defaults to FHEVM_* environment variables
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Extra mock chain as <chain_id>=<url>; repeatable
    #[arg(long = "mock-chain")]
    pub mock_chains: Vec<String>,
}

fn load_config(path: Option<&PathBuf>) -> Result<SessionConfig> {
    let config = match path {
        Some(path) => SessionConfig::load_toml(path)?,
        None => SessionConfig::from_env()?,
    };
    Ok(config)
}

fn apply_mock_chains(config: &mut SessionConfig, extra: &[String]) -> Result<()> {
    for entry in extra {
        let overrides = MockChains::parse_overrides(entry).map_err(|e| anyhow!(e))?;
        for (chain_id, url) in overrides {
            config.mock_chains.insert(chain_id, url);
        }
    }
    Ok(())
}

/// Resolve an endpoint and print the outcome
pub async fn resolve(args: ResolveArgs) -> Result<()> {
    let mut config = SessionConfig::from_env()?;
    apply_mock_chains(&mut config, &args.mock_chains)?;
    if let Some(secs) = args.timeout_secs {
        config.rpc_timeout = Duration::from_secs(secs);
    }

    println!("🔗 Resolving {}...", args.rpc_url);
    let resolver =
        EndpointResolver::new(Arc::new(HttpConnector::new())).with_timeout(config.rpc_timeout);
    let provider = ProviderHandle::from(args.rpc_url.as_str());

    match resolver.resolve(&provider, &config.mock_chains).await? {
        Resolution::Mock { chain_id, rpc_url } => {
            println!("✅ Mock network");
            println!("  Chain ID: {}", chain_id);
            println!("  RPC URL:  {}", rpc_url);
        }
        Resolution::Generic { chain_id, rpc_url } => {
            println!("✅ Generic network");
            println!("  Chain ID: {}", chain_id);
            if let Some(rpc_url) = rpc_url {
                println!("  RPC URL:  {}", rpc_url);
            }
        }
    }

    Ok(())
}

/// Probe a node for relayer metadata
pub async fn probe(args: ProbeArgs) -> Result<()> {
    let config = SessionConfig::from_env()?;
    let marker = args.marker.unwrap_or(config.client_version_marker);

    println!("🔍 Probing {} for FHEVM relayer metadata...", args.rpc_url);
    let probe = MetadataProbe::new(Arc::new(HttpConnector::new()))
        .with_timeout(config.rpc_timeout)
        .with_marker(marker);

    match probe.probe(&args.rpc_url).await {
        Some(metadata) => {
            println!("✅ Relayer metadata:");
            println!("  ACL:            {:?}", metadata.acl_address);
            println!("  InputVerifier:  {:?}", metadata.input_verifier_address);
            println!("  KMSVerifier:    {:?}", metadata.kms_verifier_address);
        }
        None => println!("none"),
    }

    Ok(())
}

/// Run a session controller until the build settles
pub async fn session(args: SessionArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    apply_mock_chains(&mut config, &args.mock_chains)?;

    let medium: Arc<dyn StorageMedium> = match &config.cache_dir {
        Some(dir) => {
            debug!(dir = %dir.display(), "Using file key cache");
            Arc::new(FileMedium::new(dir.clone()))
        }
        None => Arc::new(MemoryMedium::new()),
    };
    let lifecycle = Arc::new(
        SdkLifecycle::new(Arc::new(UnavailableSdkLoader))
            .with_load_timeout(config.sdk_load_timeout),
    );
    let builder = InstanceBuilder::from_config(
        &config,
        Arc::new(HttpConnector::new()),
        lifecycle,
        PublicKeyStore::new(medium),
    );

    let controller = SessionController::new(Arc::new(builder), ControllerOptions::from(&config))
        .context("Failed to start session controller")?;

    println!("🚀 Starting session for {}...", args.rpc_url);
    controller.set_provider(Some(ProviderHandle::from(args.rpc_url.as_str())));

    let mut updates = controller.status_stream();
    while let Some(snapshot) = updates.next().await {
        match snapshot.phase {
            Some(phase) => println!("  {} ({})", snapshot.status, phase),
            None => println!("  {}", snapshot.status),
        }
        if snapshot.status != SessionStatus::Loading {
            break;
        }
    }

    let snapshot = controller.snapshot();
    match snapshot.status {
        SessionStatus::Ready => println!("✅ Session ready"),
        SessionStatus::Idle => println!("⏸️  Session idle (provider not reachable)"),
        SessionStatus::Error => {
            if let Some(err) = snapshot.error {
                println!("❌ {}", err);
            }
        }
        SessionStatus::Loading => println!("⏳ Session still loading"),
    }

    controller.shutdown();
    Ok(())
}

pub fn version() -> Result<()> {
    println!("{}", crate::version::get_version_string());
    println!("{}", serde_json::to_string_pretty(&crate::version::get_version_info())?);
    Ok(())
}
