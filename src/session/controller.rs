// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session controller
//!
//! Owns the single live encryption instance and at most one in-flight build.
//!
//! ```text
//!            provider + enabled
//!   Idle ─────────────────────────▶ Loading ──ok──────────▶ Ready
//!    ▲                                 │  └──network error──▶ Idle
//!    │ disabled / no provider          └────other error────▶ Error
//!    └──────────── Ready / Error ◀──── refresh / provider change ──▶ Loading
//! ```
//!
//! Every transition that starts or stops a build bumps a generation counter and
//! cancels the previous token. A finished build is accepted only if its token
//! is live, its generation is current and the live provider still equals the
//! snapshot it started from.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::builder::{BuildPhase, InstanceBuilder};
use crate::config::chains::MockChains;
use crate::config::settings::SessionConfig;
use crate::error::FhevmError;
use crate::network::rpc::ProviderHandle;
use crate::sdk::instance::FhevmInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Loading => "loading",
            SessionStatus::Ready => "ready",
            SessionStatus::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed build, named after its cause
#[derive(Debug, Clone)]
pub struct SessionError {
    pub name: String,
    pub message: String,
    source: FhevmError,
}

impl SessionError {
    pub fn cause(&self) -> &FhevmError {
        &self.source
    }
}

impl From<FhevmError> for SessionError {
    fn from(err: FhevmError) -> Self {
        Self {
            name: err.name().to_string(),
            message: err.to_string(),
            source: err,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Observable controller state
#[derive(Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub instance: Option<Arc<dyn FhevmInstance>>,
    pub error: Option<SessionError>,
    /// Last phase reported by the running build
    pub phase: Option<BuildPhase>,
    pub generation: u64,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn idle(generation: u64) -> Self {
        Self {
            status: SessionStatus::Idle,
            instance: None,
            error: None,
            phase: None,
            generation,
            updated_at: Utc::now(),
        }
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("status", &self.status)
            .field("has_instance", &self.instance.is_some())
            .field("error", &self.error)
            .field("phase", &self.phase)
            .field("generation", &self.generation)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub enabled: bool,
    pub mock_chains: MockChains,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            mock_chains: MockChains::new(),
        }
    }
}

impl From<&SessionConfig> for ControllerOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            enabled: config.enabled,
            mock_chains: config.mock_chains.clone(),
        }
    }
}

struct Inner {
    enabled: bool,
    provider: Option<ProviderHandle>,
    mock_chains: MockChains,
    generation: u64,
    token: Option<CancellationToken>,
}

struct Shared {
    builder: Arc<InstanceBuilder>,
    runtime: Handle,
    inner: Mutex<Inner>,
    state: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, snapshot: SessionSnapshot) {
        self.state.send_replace(snapshot);
    }

    /// Cancel whatever runs, then start a build if enabled with a provider
    fn reconcile(self: &Arc<Self>, inner: &mut Inner) {
        if let Some(token) = inner.token.take() {
            token.cancel();
        }
        inner.generation += 1;
        let generation = inner.generation;

        let provider = match (inner.enabled, inner.provider.clone()) {
            (true, Some(provider)) => provider,
            _ => {
                debug!(generation, "Session idle");
                self.publish(SessionSnapshot::idle(generation));
                return;
            }
        };

        let token = CancellationToken::new();
        inner.token = Some(token.clone());
        self.publish(SessionSnapshot {
            status: SessionStatus::Loading,
            ..SessionSnapshot::idle(generation)
        });
        info!(generation, provider = ?provider, "Building FHEVM instance");

        let shared = Arc::clone(self);
        let mock_chains = inner.mock_chains.clone();
        self.runtime.spawn(async move {
            let phase_shared = Arc::clone(&shared);
            let phase_token = token.clone();
            let on_phase = move |phase: BuildPhase| {
                phase_shared.record_phase(generation, &phase_token, phase);
            };
            let result = shared
                .builder
                .build(&provider, &mock_chains, &token, &on_phase)
                .await;
            shared.complete(generation, &provider, &token, result);
        });
    }

    fn record_phase(&self, generation: u64, token: &CancellationToken, phase: BuildPhase) {
        let inner = self.lock();
        if token.is_cancelled() || inner.generation != generation {
            return;
        }
        debug!(generation, phase = %phase, "Build phase");
        self.state.send_modify(|snapshot| {
            snapshot.phase = Some(phase);
            snapshot.updated_at = Utc::now();
        });
    }

    fn complete(
        &self,
        generation: u64,
        provider: &ProviderHandle,
        token: &CancellationToken,
        result: Result<Arc<dyn FhevmInstance>, FhevmError>,
    ) {
        let mut inner = self.lock();
        if token.is_cancelled()
            || inner.generation != generation
            || inner.provider.as_ref() != Some(provider)
        {
            debug!(generation, "Discarding result of superseded build");
            return;
        }
        inner.token = None;

        let phase = self.state.borrow().phase;
        match result {
            Ok(instance) => {
                info!(generation, "🔐 FHEVM session ready");
                self.publish(SessionSnapshot {
                    status: SessionStatus::Ready,
                    instance: Some(instance),
                    phase,
                    ..SessionSnapshot::idle(generation)
                });
            }
            Err(e) if e.is_aborted() => {
                debug!(generation, "Build aborted");
            }
            Err(e) if e.is_network() => {
                info!(generation, "Provider not reachable yet: {}", e);
                self.publish(SessionSnapshot::idle(generation));
            }
            Err(e) => {
                error!(generation, "Error creating FHEVM instance: {}", e);
                self.publish(SessionSnapshot {
                    status: SessionStatus::Error,
                    error: Some(SessionError::from(e)),
                    phase,
                    ..SessionSnapshot::idle(generation)
                });
            }
        }
    }
}

pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    /// Must be called from within a Tokio runtime; builds run on that runtime
    pub fn new(
        builder: Arc<InstanceBuilder>,
        options: ControllerOptions,
    ) -> Result<Self, FhevmError> {
        let runtime = Handle::try_current()
            .map_err(|e| FhevmError::Config(format!("no Tokio runtime: {}", e)))?;
        let (state, _) = watch::channel(SessionSnapshot::idle(0));

        Ok(Self {
            shared: Arc::new(Shared {
                builder,
                runtime,
                inner: Mutex::new(Inner {
                    enabled: options.enabled,
                    provider: None,
                    mock_chains: options.mock_chains,
                    generation: 0,
                    token: None,
                }),
                state,
            }),
        })
    }

    /// Provider change; `None` means the wallet disconnected
    pub fn set_provider(&self, provider: Option<ProviderHandle>) {
        let mut inner = self.shared.lock();
        if inner.provider == provider {
            return;
        }
        inner.provider = provider;
        self.shared.reconcile(&mut inner);
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut inner = self.shared.lock();
        if inner.enabled == enabled {
            return;
        }
        inner.enabled = enabled;
        self.shared.reconcile(&mut inner);
    }

    /// Takes effect on the next build
    pub fn set_mock_chains(&self, mock_chains: MockChains) {
        self.shared.lock().mock_chains = mock_chains;
    }

    /// Drop the current instance and build again against the current provider
    pub fn refresh(&self) {
        let mut inner = self.shared.lock();
        if let Some(token) = inner.token.take() {
            token.cancel();
        }
        self.shared.publish(SessionSnapshot::idle(inner.generation));
        self.shared.reconcile(&mut inner);
    }

    /// Cancel any build and stay idle until re-enabled
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        inner.enabled = false;
        self.shared.reconcile(&mut inner);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.state.borrow().status
    }

    pub fn instance(&self) -> Option<Arc<dyn FhevmInstance>> {
        self.shared.state.borrow().instance.clone()
    }

    pub fn error(&self) -> Option<SessionError> {
        self.shared.state.borrow().error.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.lock().enabled
    }

    pub fn provider(&self) -> Option<ProviderHandle> {
        self.shared.lock().provider.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.state.subscribe()
    }

    pub fn status_stream(&self) -> WatchStream<SessionSnapshot> {
        WatchStream::new(self.subscribe())
    }

    /// Wait until the status is anything but `Loading`
    pub async fn wait_settled(&self) -> SessionSnapshot {
        let mut rx = self.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.status != SessionStatus::Loading {
                return snapshot;
            }
            if rx.changed().await.is_err() {
                return snapshot;
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        if let Some(token) = inner.token.take() {
            token.cancel();
        }
        inner.generation += 1;
    }
}
