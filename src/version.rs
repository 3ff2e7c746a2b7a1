// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the FHEVM session engine

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-session-engine-2026-10-14";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2026-10-14";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "endpoint-resolution",
    "hardhat-mock-detection",
    "relayer-metadata-probe",
    "sdk-lifecycle",
    "public-key-cache",
    "cancellable-builds",
    "stale-result-guard",
];

/// Chain ids mapped to a local node by default
pub const DEFAULT_MOCK_CHAINS: &[u64] = &[
    31337, // Hardhat
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("FHEVM Session {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info as JSON
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
        "mock_chains": DEFAULT_MOCK_CHAINS,
    })
}
