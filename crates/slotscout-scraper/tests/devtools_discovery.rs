//! DevTools HTTP discovery against a `wiremock` stand-in for Chrome.

use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use slotscout_scraper::browser::discovery;
use slotscout_scraper::ScraperError;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .expect("failed to build test client")
}

#[tokio::test]
async fn version_endpoint_yields_the_browser_socket() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Browser": "HeadlessChrome/126.0",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
        })))
        .mount(&server)
        .await;

    let ws = discovery::wait_for_devtools(&client(), &server.uri(), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(ws, "ws://127.0.0.1:9222/devtools/browser/abc");
}

#[tokio::test]
async fn endpoint_that_never_comes_up_is_a_session_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let started = Instant::now();

    let err = discovery::wait_for_devtools(&client(), &server.uri(), Duration::from_millis(300))
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::Session { .. }), "{err:?}");
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn first_page_target_is_chosen() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "type": "service_worker", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/worker/1" },
            { "type": "page", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/A" },
            { "type": "page", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/B" }
        ])))
        .mount(&server)
        .await;

    let ws = discovery::page_ws_url(&client(), &server.uri()).await.unwrap();

    assert_eq!(ws, "ws://127.0.0.1:9222/devtools/page/A");
}

#[tokio::test]
async fn no_page_target_is_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "type": "browser" }
        ])))
        .expect(6)
        .mount(&server)
        .await;

    let err = discovery::page_ws_url(&client(), &server.uri()).await.unwrap_err();

    assert!(matches!(err, ScraperError::DevToolsNotReady { .. }), "{err:?}");
}
