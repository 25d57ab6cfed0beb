//! End-to-end failover behaviour against raw TCP mock backends.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use failover_proxy::health::HealthState;

mod common;

use common::{blue_green_config, client, dead_address, spawn_proxy, start_healthy_backend, start_pool_backend, MockReply};

fn pool_of(res: &reqwest::Response) -> String {
    res.headers()
        .get("x-app-pool")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn state_of(proxy: &common::TestProxy, id: &str) -> HealthState {
    let target = proxy.proxy.group().get(id).unwrap();
    proxy.proxy.tracker().state(target, Instant::now())
}

#[tokio::test]
async fn test_primary_serves_when_healthy() {
    let blue = start_healthy_backend("blue").await;
    let green = start_healthy_backend("green").await;
    let proxy = spawn_proxy(blue_green_config(blue, green)).await;

    let res = client().get(proxy.url("/version")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(pool_of(&res), "blue");
    assert_eq!(res.headers().get("x-release-id").unwrap(), "blue-v1");
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "blue");
    assert_eq!(state_of(&proxy, "blue"), HealthState::Healthy);
}

#[tokio::test]
async fn test_primary_500_retries_on_backup() {
    let blue = start_pool_backend("blue", |_| async { MockReply::status(500, "chaos") }).await;
    let green = start_healthy_backend("green").await;
    let proxy = spawn_proxy(blue_green_config(blue, green)).await;

    let res = client().get(proxy.url("/version")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(pool_of(&res), "green");
    assert_eq!(res.headers().get("x-release-id").unwrap(), "green-v1");
    assert_eq!(state_of(&proxy, "blue"), HealthState::Failed);
    assert_eq!(state_of(&proxy, "green"), HealthState::Healthy);
}

#[tokio::test]
async fn test_backup_serves_everything_while_primary_failed() {
    let blue_calls = Arc::new(AtomicU32::new(0));
    let calls = blue_calls.clone();
    let blue = start_pool_backend("blue", move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { MockReply::status(500, "chaos") }
    })
    .await;
    let green = start_healthy_backend("green").await;
    let proxy = spawn_proxy(blue_green_config(blue, green)).await;
    let client = client();

    // Trip the primary.
    let res = client.get(proxy.url("/version")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    for _ in 0..10 {
        let res = client.get(proxy.url("/version")).send().await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(pool_of(&res), "green");
    }

    assert_eq!(blue_calls.load(Ordering::SeqCst), 1, "failed primary must not see traffic");
}

#[tokio::test]
async fn test_primary_reprobed_after_fail_timeout() {
    let chaos = Arc::new(AtomicBool::new(true));
    let flag = chaos.clone();
    let blue = start_pool_backend("blue", move |_| {
        let failing = flag.load(Ordering::SeqCst);
        async move {
            if failing {
                MockReply::status(500, "chaos")
            } else {
                MockReply::ok("blue")
            }
        }
    })
    .await;
    let green = start_healthy_backend("green").await;

    let mut config = blue_green_config(blue, green);
    config.health.fail_timeout_ms = 300;
    let proxy = spawn_proxy(config).await;
    let client = client();

    let res = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(pool_of(&res), "green");
    assert_eq!(state_of(&proxy, "blue"), HealthState::Failed);

    chaos.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(state_of(&proxy, "blue"), HealthState::Suspect);

    let res = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(pool_of(&res), "blue");
    assert_eq!(state_of(&proxy, "blue"), HealthState::Healthy);

    let res = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(pool_of(&res), "blue");
}

#[tokio::test]
async fn test_both_failing_returns_502() {
    let blue = start_pool_backend("blue", |_| async { MockReply::status(500, "chaos") }).await;
    let green = start_pool_backend("green", |_| async { MockReply::status(500, "chaos") }).await;
    let proxy = spawn_proxy(blue_green_config(blue, green)).await;

    let res = client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 502);

    let group = proxy.proxy.group();
    for id in ["blue", "green"] {
        let target = group.get(id).unwrap();
        assert_eq!(target.health().snapshot().failure_count, 1, "{id}");
        assert_eq!(target.total_failures(), 1, "{id}");
        assert_eq!(state_of(&proxy, id), HealthState::Failed);
    }
}

#[tokio::test]
async fn test_last_resort_goes_to_primary() {
    let blue_calls = Arc::new(AtomicU32::new(0));
    let calls = blue_calls.clone();
    let blue = start_pool_backend("blue", move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { MockReply::status(503, "down") }
    })
    .await;
    let green = start_pool_backend("green", |_| async { MockReply::status(503, "down") }).await;
    let proxy = spawn_proxy(blue_green_config(blue, green)).await;
    let client = client();

    let res = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    assert_eq!(blue_calls.load(Ordering::SeqCst), 1);

    // Everything is failed: the primary still gets a single forced attempt.
    let res = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    assert_eq!(blue_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_connection_refused_fails_over() {
    let blue = dead_address().await;
    let green = start_healthy_backend("green").await;
    let proxy = spawn_proxy(blue_green_config(blue, green)).await;

    let res = client().get(proxy.url("/")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(pool_of(&res), "green");
    assert_eq!(state_of(&proxy, "blue"), HealthState::Failed);
}

#[tokio::test]
async fn test_slow_primary_fails_over() {
    let blue = start_pool_backend("blue", |_| async { MockReply::ok("blue").delayed(Duration::from_secs(3)) }).await;
    let green = start_healthy_backend("green").await;

    let mut config = blue_green_config(blue, green);
    config.timeouts.connect_ms = 200;
    config.timeouts.read_ms = 300;
    config.timeouts.overall_ms = 3_000;
    let proxy = spawn_proxy(config).await;

    let start = Instant::now();
    let res = client().get(proxy.url("/")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(pool_of(&res), "green");
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(state_of(&proxy, "blue"), HealthState::Failed);
}

#[tokio::test]
async fn test_read_timeout_not_extended_by_unused_connect_time() {
    // Connects instantly, answers after 1s: over read_ms, under connect_ms + read_ms.
    let blue = start_pool_backend("blue", |_| async { MockReply::ok("blue").delayed(Duration::from_millis(1_000)) }).await;
    let green = start_healthy_backend("green").await;

    let mut config = blue_green_config(blue, green);
    config.timeouts.connect_ms = 2_000;
    config.timeouts.read_ms = 300;
    config.timeouts.overall_ms = 5_000;
    let proxy = spawn_proxy(config).await;

    let start = Instant::now();
    let res = client().get(proxy.url("/")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(pool_of(&res), "green");
    assert!(start.elapsed() < Duration::from_millis(900));
    assert_eq!(state_of(&proxy, "blue"), HealthState::Failed);
}

#[tokio::test]
async fn test_all_slow_returns_504() {
    let blue = start_pool_backend("blue", |_| async { MockReply::ok("blue").delayed(Duration::from_secs(3)) }).await;
    let green = start_pool_backend("green", |_| async { MockReply::ok("green").delayed(Duration::from_secs(3)) }).await;

    let mut config = blue_green_config(blue, green);
    config.timeouts.connect_ms = 200;
    config.timeouts.read_ms = 300;
    config.timeouts.overall_ms = 3_000;
    let proxy = spawn_proxy(config).await;

    let start = Instant::now();
    let res = client().get(proxy.url("/")).send().await.unwrap();

    assert_eq!(res.status(), 504);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_overall_deadline_caps_request() {
    let blue = start_pool_backend("blue", |_| async { MockReply::ok("blue").delayed(Duration::from_secs(3)) }).await;
    let green = start_healthy_backend("green").await;

    let mut config = blue_green_config(blue, green);
    config.timeouts.connect_ms = 200;
    config.timeouts.read_ms = 2_000;
    config.timeouts.overall_ms = 400;
    let proxy = spawn_proxy(config).await;

    let start = Instant::now();
    let res = client().get(proxy.url("/")).send().await.unwrap();

    assert_eq!(res.status(), 504);
    assert!(start.elapsed() < Duration::from_millis(1_500));
}

#[tokio::test]
async fn test_client_error_passes_through() {
    let green_calls = Arc::new(AtomicU32::new(0));
    let calls = green_calls.clone();
    let blue = start_pool_backend("blue", |_| async { MockReply::status(404, "missing") }).await;
    let green = start_pool_backend("green", move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { MockReply::ok("green") }
    })
    .await;
    let proxy = spawn_proxy(blue_green_config(blue, green)).await;

    let res = client().get(proxy.url("/nope")).send().await.unwrap();

    assert_eq!(res.status(), 404);
    assert_eq!(pool_of(&res), "blue");
    assert_eq!(res.text().await.unwrap(), "missing");
    assert_eq!(green_calls.load(Ordering::SeqCst), 0);
    assert_eq!(state_of(&proxy, "blue"), HealthState::Healthy);
}

#[tokio::test]
async fn test_cautious_post_not_replayed_after_server_error() {
    let green_calls = Arc::new(AtomicU32::new(0));
    let calls = green_calls.clone();
    let blue = start_pool_backend("blue", |_| async { MockReply::status(500, "boom") }).await;
    let green = start_pool_backend("green", move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { MockReply::ok("green") }
    })
    .await;
    let mut config = blue_green_config(blue, green);
    config.retries.retry_non_idempotent = false;
    let proxy = spawn_proxy(config).await;

    let res = client().post(proxy.url("/orders")).body("{}").send().await.unwrap();

    assert_eq!(res.status(), 502);
    assert_eq!(green_calls.load(Ordering::SeqCst), 0);
    assert_eq!(state_of(&proxy, "blue"), HealthState::Failed);
}

#[tokio::test]
async fn test_post_replayed_after_connect_failure() {
    let blue = dead_address().await;
    let green = start_pool_backend("green", |req| async move {
        MockReply::status(201, String::from_utf8_lossy(&req.body).to_string())
    })
    .await;
    let mut config = blue_green_config(blue, green);
    config.retries.retry_non_idempotent = false;
    let proxy = spawn_proxy(config).await;

    let res = client()
        .post(proxy.url("/orders"))
        .body(r#"{"item":42}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 201);
    assert_eq!(pool_of(&res), "green");
    assert_eq!(res.text().await.unwrap(), r#"{"item":42}"#);
}

#[tokio::test]
async fn test_post_replayed_after_server_error_by_default() {
    let blue = start_pool_backend("blue", |_| async { MockReply::status(500, "boom") }).await;
    let green = start_pool_backend("green", |req| async move {
        MockReply::ok(format!("{} {}", req.method, String::from_utf8_lossy(&req.body)))
    })
    .await;
    let proxy = spawn_proxy(blue_green_config(blue, green)).await;

    let res = client().post(proxy.url("/")).body("{}").send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(pool_of(&res), "green");
    assert_eq!(res.text().await.unwrap(), "POST {}");
    assert_eq!(state_of(&proxy, "blue"), HealthState::Failed);

    let res = client().patch(proxy.url("/")).body("{}").send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(pool_of(&res), "green");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let blue = start_healthy_backend("blue").await;
    let green = start_healthy_backend("green").await;

    let mut config = blue_green_config(blue, green);
    config.listener.max_body_bytes = 16;
    let proxy = spawn_proxy(config).await;

    let res = client().post(proxy.url("/upload")).body(vec![b'x'; 100]).send().await.unwrap();

    assert_eq!(res.status(), 413);
    assert_eq!(state_of(&proxy, "blue"), HealthState::Healthy);
}

#[tokio::test]
async fn test_path_and_query_forwarded() {
    let blue = start_pool_backend("blue", |req| async move { MockReply::ok(format!("{} {}", req.method, req.path)) }).await;
    let green = start_healthy_backend("green").await;
    let proxy = spawn_proxy(blue_green_config(blue, green)).await;

    let res = client().delete(proxy.url("/items/7?force=true")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "DELETE /items/7?force=true");
}

#[tokio::test]
async fn test_failures_below_threshold_keep_primary() {
    let fails = Arc::new(AtomicU32::new(0));
    let counter = fails.clone();
    let blue = start_pool_backend("blue", move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                MockReply::status(503, "blip")
            } else {
                MockReply::ok("blue")
            }
        }
    })
    .await;
    let green = start_healthy_backend("green").await;

    let mut config = blue_green_config(blue, green);
    config.health.max_fails = 3;
    let proxy = spawn_proxy(config).await;

    // One 503 with max_fails = 3 leaves blue selectable, so there is no
    // alternate target to retry on.
    let res = client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    assert_eq!(state_of(&proxy, "blue"), HealthState::Healthy);

    let res = client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(pool_of(&res), "blue");
    assert_eq!(proxy.proxy.group().get("blue").unwrap().health().snapshot().failure_count, 0);
}
