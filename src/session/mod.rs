// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encryption session
//!
//! - **builder**: resolves the endpoint and constructs one instance
//! - **controller**: keeps at most one live instance in step with the provider

pub mod builder;
pub mod controller;

pub use builder::{BuildPhase, InstanceBuilder};
pub use controller::{
    ControllerOptions, SessionController, SessionError, SessionSnapshot, SessionStatus,
};
