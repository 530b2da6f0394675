//! HTTP-backed refresh sources against a mock device cloud.

use std::sync::Arc;
use std::time::Duration;

use petdash_cache::CacheConfig;
use petdash_refresh::{
    DashboardCache, DeviceHubConfig, DeviceHubSource, DeviceKind, FeederConfig, FeederSource,
    RefreshConfig, RefreshError, RefreshOrchestrator, RefreshSource,
};
use petdash_session::{
    HttpApiClient, HttpApiConfig, MemorySessionStore, RemoteError, ResilientSession, SessionConfig,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cache() -> DashboardCache {
    DashboardCache::new(CacheConfig::default()).unwrap()
}

async fn session_for(server: &MockServer, name: &str) -> Arc<ResilientSession<HttpApiClient>> {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
        .mount(server)
        .await;

    let config = HttpApiConfig::new(name, server.uri()).with_login("/login", "user", "pass");
    Arc::new(ResilientSession::new(
        Arc::new(HttpApiClient::new(config).unwrap()),
        Arc::new(MemorySessionStore::new()),
        SessionConfig::new(name),
    ))
}

fn hub_config() -> DeviceHubConfig {
    DeviceHubConfig {
        devices_path: "/devices".to_string(),
        stats_paths: vec![
            "/v2/devices/{id}/stats".to_string(),
            "/v1/stats/{id}".to_string(),
        ],
    }
}

#[tokio::test]
async fn test_device_hub_writes_devices_and_stats() {
    let server = MockServer::start().await;
    let session = session_for(&server, "petkit").await;

    Mock::given(method("GET"))
        .and(path("/devices"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"id": 1, "name": "Upstairs", "type": "t4", "battery": 90},
                {"id": 2, "name": "Downstairs", "type": "T5"},
                {"id": 3, "name": "Mystery", "type": "k9"}
            ]
        })))
        .mount(&server)
        .await;

    // Device 1 only answers on the legacy endpoint
    Mock::given(method("GET"))
        .and(path("/v2/devices/1/stats"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/stats/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"times": 4})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/2/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"times": 7})))
        .mount(&server)
        .await;

    let source = DeviceHubSource::new("petkit", session, hub_config(), &RefreshConfig::default());
    let cache = cache();

    let written = source.refresh(&cache).await.unwrap();

    assert_eq!(written, 3);
    let devices = cache.get("petkit_devices").await.unwrap();
    let devices = devices.as_devices().unwrap();
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[2].kind, DeviceKind::Unknown { raw: "k9".into() });

    assert_eq!(
        cache.get("petkit_stats_1").await.unwrap().as_json().unwrap()["times"],
        4
    );
    assert_eq!(
        cache.get("petkit_stats_2").await.unwrap().as_json().unwrap()["times"],
        7
    );
    // Unknown devices aren't queried for stats
    assert!(!cache.exists("petkit_stats_3").await);
    assert_eq!(source.stats_failures(), 0);
}

#[tokio::test]
async fn test_device_stats_failure_does_not_abort_others() {
    let server = MockServer::start().await;
    let session = session_for(&server, "petkit").await;

    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a", "type": "t4"},
            {"id": "b", "type": "t4"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/devices/b/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"times": 1})))
        .mount(&server)
        .await;

    let source = DeviceHubSource::new("petkit", session, hub_config(), &RefreshConfig::default());
    let cache = cache();

    let written = source.refresh(&cache).await.unwrap();

    assert_eq!(written, 2);
    assert!(!cache.exists("petkit_stats_a").await);
    assert!(cache.exists("petkit_stats_b").await);
    assert_eq!(source.stats_failures(), 1);
}

#[tokio::test]
async fn test_device_list_failure_keeps_previous_value() {
    let server = MockServer::start().await;
    let session = session_for(&server, "petkit").await;

    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let cache = cache();
    cache
        .set(
            "petkit_devices",
            petdash_refresh::Snapshot::Devices(vec![]),
            Some(Duration::from_secs(300)),
        )
        .await;

    let source = DeviceHubSource::new("petkit", session, hub_config(), &RefreshConfig::default());
    let err = source.refresh(&cache).await.unwrap_err();

    assert!(matches!(
        err,
        RefreshError::Remote {
            error: RemoteError::Transient(_),
            ..
        }
    ));
    assert!(cache.exists("petkit_devices").await);
}

#[tokio::test]
async fn test_feeder_writes_servings_and_plans() {
    let server = MockServer::start().await;
    let session = session_for(&server, "cloudpets").await;

    Mock::given(method("GET"))
        .and(path("/feeder/servings/today"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 3})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feeder/plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [{"id": 1, "hour": 8, "minute": 0}]
        })))
        .mount(&server)
        .await;

    let source = FeederSource::new(
        "cloudpets",
        session,
        FeederConfig::default(),
        &RefreshConfig::default(),
    );
    let cache = cache();

    assert_eq!(source.refresh(&cache).await.unwrap(), 2);
    assert_eq!(
        cache.get("cloudpets_servings").await.unwrap().as_json().unwrap()["result"],
        3
    );
    assert_eq!(
        cache.get("cloudpets_plans").await.unwrap().as_json().unwrap()[0]["hour"],
        8
    );
}

#[tokio::test]
async fn test_combined_refresh_over_http() {
    let hub_server = MockServer::start().await;
    let feeder_server = MockServer::start().await;
    let hub_session = session_for(&hub_server, "petkit").await;
    let feeder_session = session_for(&feeder_server, "cloudpets").await;

    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&hub_server)
        .await;
    // The feeder cloud is down
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&feeder_server)
        .await;

    let config = RefreshConfig::default();
    let orchestrator = RefreshOrchestrator::new(cache(), config.clone())
        .with_source(Arc::new(DeviceHubSource::new(
            "petkit",
            hub_session,
            hub_config(),
            &config,
        )))
        .with_source(Arc::new(FeederSource::new(
            "cloudpets",
            feeder_session,
            FeederConfig::default(),
            &config,
        )));

    let err = orchestrator.force_refresh().await.unwrap_err();
    let report = err.report().unwrap();

    assert!(matches!(err, RefreshError::Partial { .. }));
    assert_eq!(report.succeeded().next().unwrap().source, "petkit");
    assert_eq!(report.failed().next().unwrap().source, "cloudpets");
    assert!(orchestrator.cache().exists("petkit_devices").await);
    assert!(orchestrator.status().await.last_refresh.is_some());
}
