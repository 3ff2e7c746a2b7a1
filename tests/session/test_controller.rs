// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session controller state machine

use crate::common::{FakeSdk, ScriptedConnector, ScriptedProvider};
use async_trait::async_trait;
use fhevm_session::config::MockChains;
use fhevm_session::error::FhevmError;
use fhevm_session::network::ProviderHandle;
use fhevm_session::sdk::lifecycle::{RelayerSdk, SdkLifecycle, SdkLoader, StaticSdkLoader};
use fhevm_session::session::{
    BuildPhase, ControllerOptions, InstanceBuilder, SessionController, SessionStatus,
};
use fhevm_session::storage::{MemoryMedium, PublicKeyStore};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

const LOCAL_URL: &str = "http://localhost:8545";
const SEPOLIA_URL: &str = "https://sepolia.example.org";

struct OfflineLoader;

#[async_trait]
impl SdkLoader for OfflineLoader {
    async fn load(&self) -> Result<Arc<dyn RelayerSdk>, FhevmError> {
        Err(FhevmError::Network("Failed to fetch relayer bundle".to_string()))
    }
}

fn connector() -> Arc<ScriptedConnector> {
    Arc::new(
        ScriptedConnector::new()
            .with_node(LOCAL_URL, ScriptedProvider::hardhat(31337))
            .with_node(SEPOLIA_URL, ScriptedProvider::geth(11155111)),
    )
}

fn controller_with(
    connector: Arc<ScriptedConnector>,
    loader: Arc<dyn SdkLoader>,
    enabled: bool,
) -> SessionController {
    let builder = InstanceBuilder::new(
        connector,
        Arc::new(SdkLifecycle::new(loader)),
        PublicKeyStore::new(Arc::new(MemoryMedium::new())),
    );
    SessionController::new(
        Arc::new(builder),
        ControllerOptions {
            enabled,
            mock_chains: MockChains::new(),
        },
    )
    .unwrap()
}

fn controller(sdk: Arc<FakeSdk>) -> SessionController {
    controller_with(connector(), Arc::new(StaticSdkLoader::new(sdk)), true)
}

#[tokio::test]
async fn test_starts_idle_without_provider() {
    let controller = controller(Arc::new(FakeSdk::new()));
    assert_eq!(controller.status(), SessionStatus::Idle);
    assert!(controller.instance().is_none());

    controller.set_provider(None);
    assert_eq!(controller.status(), SessionStatus::Idle);
    assert_eq!(controller.snapshot().generation, 0, "No-op change must not restart");
}

#[tokio::test]
async fn test_mock_node_becomes_ready() {
    let controller = controller(Arc::new(FakeSdk::new()));

    controller.set_provider(Some(ProviderHandle::from(LOCAL_URL)));
    assert_eq!(controller.status(), SessionStatus::Loading);

    let snapshot = controller.wait_settled().await;
    assert_eq!(snapshot.status, SessionStatus::Ready);
    assert!(snapshot.instance.is_some());
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.phase, Some(BuildPhase::Creating));
}

#[tokio::test]
async fn test_production_chain_becomes_ready_through_sdk() {
    let sdk = Arc::new(FakeSdk::new());
    let controller = controller(sdk.clone());

    controller.set_provider(Some(ProviderHandle::from(SEPOLIA_URL)));
    let snapshot = controller.wait_settled().await;

    assert_eq!(snapshot.status, SessionStatus::Ready);
    assert_eq!(sdk.init_calls(), 1);
    assert_eq!(sdk.created().len(), 1);
}

#[tokio::test]
async fn test_same_provider_does_not_rebuild() {
    let controller = controller(Arc::new(FakeSdk::new()));
    controller.set_provider(Some(ProviderHandle::from(LOCAL_URL)));
    let first = controller.wait_settled().await;

    controller.set_provider(Some(ProviderHandle::from(LOCAL_URL)));
    assert_eq!(controller.snapshot().generation, first.generation);
    assert_eq!(controller.status(), SessionStatus::Ready);
}

#[tokio::test]
async fn test_network_failure_settles_idle() {
    let controller = controller_with(connector(), Arc::new(OfflineLoader), true);

    controller.set_provider(Some(ProviderHandle::from(SEPOLIA_URL)));
    let snapshot = controller.wait_settled().await;

    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(snapshot.error.is_none(), "Network failures are not surfaced");
    assert!(snapshot.instance.is_none());
}

#[tokio::test]
async fn test_init_failure_surfaces_error() {
    let controller = controller(Arc::new(FakeSdk::new().with_init_result(false)));

    controller.set_provider(Some(ProviderHandle::from(SEPOLIA_URL)));
    let snapshot = controller.wait_settled().await;

    assert_eq!(snapshot.status, SessionStatus::Error);
    let error = snapshot.error.unwrap();
    assert_eq!(error.name, "SDKInitError");
    assert!(matches!(error.cause(), FhevmError::SdkInit(_)));
    assert!(controller.instance().is_none());
}

#[tokio::test]
async fn test_invalid_acl_surfaces_error() {
    let controller = controller(Arc::new(FakeSdk::new().with_acl_address("not-an-address")));

    controller.set_provider(Some(ProviderHandle::from(SEPOLIA_URL)));
    let snapshot = controller.wait_settled().await;

    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(
        controller.error().map(|e| e.name),
        Some("InvalidAddressError".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_stale_provider_result_is_discarded() {
    let sdk = Arc::new(FakeSdk::new().with_create_delay(Duration::from_millis(100)));
    let controller = controller(sdk.clone());

    // slow SDK build, replaced before it finishes by a fast mock build
    controller.set_provider(Some(ProviderHandle::from(SEPOLIA_URL)));
    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.set_provider(Some(ProviderHandle::from(LOCAL_URL)));

    let settled = controller.wait_settled().await;
    assert_eq!(settled.status, SessionStatus::Ready);
    assert_eq!(settled.generation, 2);

    let mut rx = controller.subscribe();
    rx.borrow_and_update();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(sdk.created().len(), 1, "The stale build did reach the SDK");
    assert!(
        !rx.has_changed().unwrap(),
        "The stale result must not replace the current instance"
    );
    assert_eq!(controller.snapshot().generation, 2);
}

#[tokio::test(start_paused = true)]
async fn test_disable_cancels_in_flight_build() {
    let sdk = Arc::new(FakeSdk::new().with_create_delay(Duration::from_millis(100)));
    let controller = controller(sdk.clone());

    controller.set_provider(Some(ProviderHandle::from(SEPOLIA_URL)));
    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.set_enabled(false);
    assert_eq!(controller.status(), SessionStatus::Idle);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(controller.status(), SessionStatus::Idle);
    assert!(controller.instance().is_none());
}

#[tokio::test]
async fn test_disabled_controller_waits_for_enable() {
    let connector = connector();
    let controller = controller_with(
        connector.clone(),
        Arc::new(StaticSdkLoader::new(Arc::new(FakeSdk::new()))),
        false,
    );

    controller.set_provider(Some(ProviderHandle::from(LOCAL_URL)));
    tokio::task::yield_now().await;
    assert_eq!(controller.status(), SessionStatus::Idle);
    assert_eq!(connector.connects(), 0);

    controller.set_enabled(true);
    assert_eq!(controller.wait_settled().await.status, SessionStatus::Ready);
}

#[tokio::test]
async fn test_disconnect_returns_to_idle() {
    let controller = controller(Arc::new(FakeSdk::new()));
    controller.set_provider(Some(ProviderHandle::from(LOCAL_URL)));
    controller.wait_settled().await;

    controller.set_provider(None);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(snapshot.instance.is_none());
}

#[tokio::test]
async fn test_refresh_rebuilds_instance() {
    let connector = connector();
    let controller = controller_with(
        connector.clone(),
        Arc::new(StaticSdkLoader::new(Arc::new(FakeSdk::new()))),
        true,
    );
    controller.set_provider(Some(ProviderHandle::from(LOCAL_URL)));
    let first = controller.wait_settled().await;
    let connects = connector.connects();

    controller.refresh();
    assert_eq!(controller.status(), SessionStatus::Loading);
    let second = controller.wait_settled().await;

    assert_eq!(second.status, SessionStatus::Ready);
    assert!(second.generation > first.generation);
    assert!(connector.connects() > connects, "Refresh should resolve again");
}

#[tokio::test]
async fn test_status_stream_reports_transitions() {
    let controller = controller(Arc::new(FakeSdk::new()));
    controller.set_provider(Some(ProviderHandle::from(LOCAL_URL)));

    let mut stream = controller.status_stream();
    let mut seen = Vec::new();
    while let Some(snapshot) = stream.next().await {
        seen.push(snapshot.status);
        if snapshot.status != SessionStatus::Loading {
            break;
        }
    }

    assert_eq!(seen.first(), Some(&SessionStatus::Loading));
    assert_eq!(seen.last(), Some(&SessionStatus::Ready));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_building() {
    let sdk = Arc::new(FakeSdk::new().with_create_delay(Duration::from_millis(100)));
    let controller = controller(sdk);

    controller.set_provider(Some(ProviderHandle::from(SEPOLIA_URL)));
    controller.shutdown();
    assert!(!controller.is_enabled());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(controller.status(), SessionStatus::Idle);
}
