// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// FHEVM session CLI
#[derive(Parser, Debug)]
#[command(name = "fhevm-session")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Resolve FHEVM endpoints and build encryption sessions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve an RPC endpoint to a mock or generic network
    Resolve(commands::ResolveArgs),

    /// Probe a node for Hardhat FHEVM relayer metadata
    Probe(commands::ProbeArgs),

    /// Build an encryption session and report its status
    Session(commands::SessionArgs),

    /// Print version information
    Version,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Resolve(args) => commands::resolve(args).await,
        Commands::Probe(args) => commands::probe(args).await,
        Commands::Session(args) => commands::session(args).await,
        Commands::Version => commands::version(),
    }
}
