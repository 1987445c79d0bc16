// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for device coordinators and entries using wiremock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use smartwater_lib::coordinator::{DeviceCoordinator, UpdateStatus};
use smartwater_lib::event::{CoordinatorEvent, EventBus};
use smartwater_lib::manager::{Entry, EntryConfig, StartWatering};
use smartwater_lib::protocol::{ApiClient, ApiConfig};
use smartwater_lib::state::ShadowMessage;
use smartwater_lib::types::Device;
use smartwater_lib::{Error, UpdateError};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig::new().rebased(&server.uri()).without_shadow()
}

fn client_for(server: &MockServer) -> ApiClient {
    api_config(server).into_client("access", "refresh").unwrap()
}

fn coordinator_for(
    server: &MockServer,
    events: &EventBus,
) -> (DeviceCoordinator, CancellationToken) {
    let cancel = CancellationToken::new();
    let coordinator = DeviceCoordinator::new(
        client_for(server),
        Device::new("D1", Some("C1".to_string())),
        events.clone(),
        &cancel,
    );
    (coordinator, cancel)
}

fn device(zones: Value) -> Value {
    json!({
        "duid": "D1",
        "clientId": "C1",
        "nickname": "Front Yard",
        "connected": true,
        "irrigation": { "zones": zones }
    })
}

fn shadow(value: Value) -> ShadowMessage {
    ShadowMessage::from_slice(value.to_string().as_bytes()).unwrap()
}

async fn mount_device(server: &MockServer, body: Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/v3/device/D1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

async fn mount_schedules(server: &MockServer, items: Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/v3/irrigation/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

async fn device_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/v3/device/D1")
        .count()
}

// ============================================================================
// Coordinator
// ============================================================================

mod coordinator {
    use super::*;

    #[tokio::test]
    async fn poll_and_shadow_combine() {
        let server = MockServer::start().await;
        mount_device(
            &server,
            device(json!([{ "clientId": "1", "name": "Lawn", "enabled": true }])),
            None,
        )
        .await;
        mount_schedules(&server, json!([]), None).await;

        let (coordinator, _cancel) = coordinator_for(&server, &EventBus::new());
        coordinator.refresh().await.unwrap();
        coordinator.handle_shadow_message(&shadow(json!({
            "state": { "reported": { "hydraOverview": { "status": "idle", "zoneID": "1" } } }
        })));

        let snapshot = coordinator.snapshot();
        assert!(snapshot.is_connected());
        assert!(snapshot.available());
        assert!(snapshot.zone_from_client_id("1").unwrap().enabled);
        assert_eq!(snapshot.watering_status(), Some("idle"));
        assert_eq!(snapshot.running_zone().unwrap().name, "Lawn");
        assert_eq!(coordinator.status(), UpdateStatus::Idle);
    }

    #[tokio::test]
    async fn poll_tolerates_type_drift() {
        let server = MockServer::start().await;
        mount_device(
            &server,
            json!({
                "duid": "D1",
                "clientId": 77,
                "connected": "true",
                "connectivity": { "rssi": -61.5 },
                "irrigation": {
                    "zones": [
                        { "clientId": 1, "name": null, "enabled": 1 },
                        { "clientId": "2", "name": "Beds", "enabled": null }
                    ]
                }
            }),
            None,
        )
        .await;
        mount_schedules(
            &server,
            json!([{ "id": 17, "name": "Morning", "status": "active" }]),
            None,
        )
        .await;

        let (coordinator, _cancel) = coordinator_for(&server, &EventBus::new());
        coordinator.refresh().await.unwrap();

        let snapshot = coordinator.snapshot();
        assert!(snapshot.available());
        assert_eq!(snapshot.client_id(), Some("77"));
        assert_eq!(snapshot.rssi(), Some(-62));
        assert_eq!(snapshot.zone_from_client_id("1").unwrap().name, "");
        assert!(snapshot.zone_from_client_id("1").unwrap().enabled);
        assert!(!snapshot.zone_from_client_id("2").unwrap().enabled);
        assert!(snapshot.is_schedule_active("17"));
        assert_eq!(coordinator.status(), UpdateStatus::Idle);
    }

    #[tokio::test]
    async fn poll_replaces_zones_and_schedules() {
        let server = MockServer::start().await;
        mount_device(
            &server,
            device(json!([
                { "clientId": "1", "name": "Lawn", "enabled": true },
                { "clientId": "2", "name": "Beds", "enabled": true }
            ])),
            Some(1),
        )
        .await;
        mount_device(
            &server,
            device(json!([{ "clientId": "1", "name": "Lawn", "enabled": true }])),
            None,
        )
        .await;
        mount_schedules(
            &server,
            json!([
                { "id": "S1", "name": "Morning", "status": "active" },
                { "id": "S2", "name": "Evening", "status": "inactive" }
            ]),
            Some(1),
        )
        .await;
        mount_schedules(
            &server,
            json!([{ "id": "S3", "name": "Weekly", "status": "active" }]),
            None,
        )
        .await;

        let (coordinator, _cancel) = coordinator_for(&server, &EventBus::new());
        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.snapshot().zones().len(), 2);
        assert!(coordinator.snapshot().is_schedule_active("S1"));

        coordinator.handle_shadow_message(&shadow(json!({
            "state": { "reported": { "hydraOverview": { "status": "running", "zoneID": "2" } } }
        })));
        coordinator.refresh().await.unwrap();

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.zones().len(), 1);
        assert!(snapshot.zone_from_client_id("2").is_none());
        assert_eq!(
            snapshot.schedules().keys().collect::<Vec<_>>(),
            vec!["S3"]
        );
        assert_eq!(snapshot.watering_status(), Some("running"));
        assert!(snapshot.running_zone().is_none());
    }

    #[tokio::test]
    async fn failed_poll_keeps_last_data() {
        let server = MockServer::start().await;
        mount_device(
            &server,
            device(json!([{ "clientId": "1", "name": "Lawn", "enabled": true }])),
            Some(1),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v3/device/D1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_schedules(&server, json!([]), None).await;

        let events = EventBus::new();
        let mut rx = events.subscribe();
        let (coordinator, _cancel) = coordinator_for(&server, &events);

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        coordinator.add_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        coordinator.refresh().await.unwrap();
        let err = coordinator.refresh().await.unwrap_err();

        assert!(matches!(err, UpdateError::UpdateFailed(_)));
        assert_eq!(coordinator.status(), UpdateStatus::Degraded);
        assert_eq!(notified.load(Ordering::SeqCst), 2);

        let snapshot = coordinator.snapshot();
        assert!(!snapshot.last_update_success());
        assert!(!snapshot.available());
        assert_eq!(snapshot.device_name(), "Front Yard");
        assert_eq!(snapshot.zones().len(), 1);

        let mut failed = false;
        while let Ok(event) = rx.try_recv() {
            failed |=
                matches!(event, CoordinatorEvent::UpdateFailed { ref duid, .. } if duid == "D1");
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn rejected_credentials_are_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/device/D1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": { "access_token": "new", "expires_in": 3600 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let events = EventBus::new();
        let mut rx = events.subscribe();
        let (coordinator, _cancel) = coordinator_for(&server, &events);

        let err = coordinator.refresh().await.unwrap_err();
        assert!(err.is_reauth_required());
        assert_eq!(coordinator.status(), UpdateStatus::ReauthRequired);

        // No further request once terminal
        let err = coordinator.refresh().await.unwrap_err();
        assert!(err.is_reauth_required());
        assert_eq!(coordinator.status(), UpdateStatus::ReauthRequired);

        let mut reauth = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, CoordinatorEvent::ReauthRequired { .. }) {
                reauth += 1;
            }
        }
        assert_eq!(reauth, 1);
    }

    #[tokio::test]
    async fn zone_enable_then_refresh() {
        let server = MockServer::start().await;
        mount_device(
            &server,
            device(json!([{ "clientId": "3", "name": "Back", "enabled": true }])),
            Some(1),
        )
        .await;
        mount_device(
            &server,
            device(json!([{ "clientId": "3", "name": "Back", "enabled": false }])),
            None,
        )
        .await;
        mount_schedules(&server, json!([]), None).await;
        Mock::given(method("POST"))
            .and(path("/v3/device/D1/zone/D1_3"))
            .and(body_json(json!({ "enabled": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let (coordinator, _cancel) = coordinator_for(&server, &EventBus::new());
        coordinator.first_refresh().await.unwrap();
        assert!(coordinator.snapshot().zone_from_client_id("3").unwrap().enabled);

        coordinator.set_zone_enabled("3", false).await.unwrap();
        assert!(!coordinator.snapshot().zone_from_client_id("3").unwrap().enabled);
    }

    #[tokio::test]
    async fn polling_stops_on_shutdown() {
        let server = MockServer::start().await;
        mount_device(&server, device(json!([])), None).await;
        mount_schedules(&server, json!([]), None).await;

        let api = api_config(&server)
            .with_poll_interval(Duration::from_millis(50))
            .into_client("access", "refresh")
            .unwrap();
        let cancel = CancellationToken::new();
        let coordinator =
            DeviceCoordinator::new(api, Device::new("D1", None), EventBus::new(), &cancel);

        coordinator.start_polling();
        tokio::time::sleep(Duration::from_millis(300)).await;
        coordinator.shutdown().await;

        let polled = device_requests(&server).await;
        assert!(polled >= 2, "only {polled} polls");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(device_requests(&server).await, polled);
    }
}

// ============================================================================
// Entry
// ============================================================================

mod entry {
    use super::*;

    async fn mount_listing(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v3/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "devices": [{ "duid": "D1", "clientId": "C1" }]
            })))
            .mount(server)
            .await;
    }

    fn entry_config(server: &MockServer) -> EntryConfig {
        EntryConfig::new("access", "refresh").with_api(api_config(server))
    }

    #[tokio::test]
    async fn setup_polls_every_device() {
        let server = MockServer::start().await;
        mount_listing(&server).await;
        mount_device(
            &server,
            device(json!([{ "clientId": "1", "name": "Lawn", "enabled": true }])),
            None,
        )
        .await;
        mount_schedules(&server, json!([]), None).await;

        let mut entry = Entry::setup(entry_config(&server)).await.unwrap();
        assert_eq!(entry.coordinators().count(), 1);

        let coordinator = entry.require("D1").unwrap();
        assert!(coordinator.last_update_success());
        assert_eq!(coordinator.snapshot().device_name(), "Front Yard");
        assert!(matches!(entry.require("D9"), Err(Error::DeviceNotFound(_))));

        entry.unload().await;
        assert_eq!(entry.coordinators().count(), 0);
    }

    #[tokio::test]
    async fn listing_failure_is_not_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/devices"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = Entry::setup(entry_config(&server)).await.unwrap_err();
        assert!(matches!(err, Error::NotReady(_)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn first_refresh_failure_aborts_setup() {
        let server = MockServer::start().await;
        mount_listing(&server).await;
        Mock::given(method("GET"))
            .and(path("/v3/device/D1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = Entry::setup(entry_config(&server)).await.unwrap_err();
        assert!(
            matches!(err, Error::Update(UpdateError::UpdateFailed(_))),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn start_watering_runs_one_zone() {
        let server = MockServer::start().await;
        mount_listing(&server).await;
        mount_device(&server, device(json!([])), None).await;
        mount_schedules(&server, json!([]), None).await;
        Mock::given(method("POST"))
            .and(path("/v3/irrigation/manual"))
            .and(body_json(json!({
                "duid": "D1",
                "ttl": 0,
                "zones": [{ "id": "D1_2", "duration": 7 }],
                "name": "Manual Run"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let entry = Entry::setup(entry_config(&server)).await.unwrap();
        let before = device_requests(&server).await;

        entry
            .start_watering(&StartWatering::new("D1", "2").with_duration(7))
            .await
            .unwrap();

        assert_eq!(device_requests(&server).await, before + 1);
    }

    #[tokio::test]
    async fn start_watering_failure_is_service_error() {
        let server = MockServer::start().await;
        mount_listing(&server).await;
        mount_device(&server, device(json!([])), None).await;
        mount_schedules(&server, json!([]), None).await;
        Mock::given(method("POST"))
            .and(path("/v3/irrigation/manual"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let entry = Entry::setup(entry_config(&server)).await.unwrap();
        let err = entry
            .start_watering(&StartWatering::new("D1", "2"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Service(_)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn reload_sets_up_again() {
        let server = MockServer::start().await;
        mount_listing(&server).await;
        mount_device(&server, device(json!([])), None).await;
        mount_schedules(&server, json!([]), None).await;

        let mut entry = Entry::setup(entry_config(&server)).await.unwrap();
        let mut events = entry.subscribe();
        entry.reload().await.unwrap();

        assert!(entry.coordinator("D1").unwrap().last_update_success());
        let mut removed = false;
        while let Ok(event) = events.try_recv() {
            removed |= matches!(event, CoordinatorEvent::DeviceRemoved { .. });
        }
        assert!(removed);
    }
}
