//! HTTP API over a real listener with in-memory collaborators.

use std::net::SocketAddr;
use std::sync::Arc;

use patternpress::server::{AppState, router};
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::helpers::{
    FakeFulfillment, FakeGenerator, FakeImageHost, FakeStorefront, Harness, http_error, pattern,
};

const KEY: &str = "test-key";

struct Server {
    base: String,
    client: reqwest::Client,
    harness: Harness,
}

impl Server {
    async fn start(harness: Harness, storefront: Option<FakeStorefront>) -> Self {
        let state = AppState::new(
            harness.orchestrator.clone(),
            Arc::new(harness.health(storefront)),
            KEY,
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            harness,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base))
            .bearer_auth(KEY)
    }

    fn post(&self, path: &str, body: Value) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base))
            .bearer_auth(KEY)
            .json(&body)
    }
}

async fn default_server() -> Server {
    let generator = FakeGenerator::returning(vec![
        pattern("Bug Tee", "Bug-Free Zone"),
        pattern("Ship Tee", "Ship It"),
    ]);
    let harness = Harness::new(generator, FakeImageHost::default(), FakeFulfillment::default());
    Server::start(harness, None).await
}

async fn json_of(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}

#[tokio::test]
async fn liveness_needs_no_auth() {
    let server = default_server().await;
    for path in ["/", "/healthcheck"] {
        let response = server
            .client
            .get(format!("{}{path}", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await, json!({ "status": "OK" }));
    }
}

#[tokio::test]
async fn protected_routes_reject_bad_credentials() {
    let server = default_server().await;
    let url = format!("{}/process_patterns", server.base);
    let body = json!({ "idea": "cats" });

    let attempts = [
        server.client.post(&url).json(&body),
        server.client.post(&url).json(&body).bearer_auth("wrong"),
        server.client.post(&url).json(&body).basic_auth("user", Some(KEY)),
    ];
    for attempt in attempts {
        let response = attempt.send().await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("www-authenticate").unwrap(),
            "Bearer"
        );
        assert!(json_of(response).await["detail"].is_string());
    }
    assert!(server.harness.generator.calls().is_empty());
}

#[tokio::test]
async fn process_patterns_reports_products() {
    let server = default_server().await;

    let response = server
        .post("/process_patterns", json!({ "idea": "debugging", "patterns": 2 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["message"], "Generated Patterns Successfully");
    assert_eq!(body["patterns"].as_array().unwrap().len(), 2);
    assert_eq!(body["patterns"][0]["product_id"], "prod-1");
    assert!(body["failures"].as_array().unwrap().is_empty());
    assert_eq!(
        server.harness.generator.calls(),
        vec![("debugging".to_owned(), 2)]
    );
}

#[tokio::test]
async fn process_patterns_uses_default_count() {
    let server = default_server().await;
    let response = server
        .post("/process_patterns", json!({ "idea": "debugging" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.harness.generator.calls()[0].1, 3);
}

#[tokio::test]
async fn partial_failures_are_summarised() {
    let harness = Harness::new(
        FakeGenerator::returning(vec![
            pattern("Bug Tee", "Bug-Free Zone"),
            pattern("Ship Tee", "Ship It"),
        ]),
        FakeImageHost::default(),
        FakeFulfillment {
            fail_create_title: Some("Ship Tee".to_owned()),
            ..FakeFulfillment::default()
        },
    );
    let server = Server::start(harness, None).await;

    let body = json_of(
        server
            .post("/process_patterns", json!({ "idea": "debugging", "patterns": 2 }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["message"], "Generated 1 patterns, 1 failed");
    assert_eq!(body["failures"][0]["stage"], "fulfillment");
    assert_eq!(body["failures"][0]["product_name"], "Ship Tee");
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_generation() {
    let server = default_server().await;
    for body in [
        json!({ "idea": "cats", "patterns": 0 }),
        json!({ "idea": "cats", "patterns": 26 }),
        json!({ "idea": "   " }),
    ] {
        let response = server.post("/process_patterns", body).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert!(server.harness.generator.calls().is_empty());
}

#[tokio::test]
async fn generation_failure_is_bad_gateway() {
    let harness = Harness::new(
        FakeGenerator::failing(http_error("openai", 500)),
        FakeImageHost::default(),
        FakeFulfillment::default(),
    );
    let server = Server::start(harness, None).await;

    let response = server
        .post("/process_patterns", json!({ "idea": "cats" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(json_of(response).await["message"].is_string());
}

#[tokio::test]
async fn queue_round_trip() {
    let server = default_server().await;

    let response = server.get("/pattern_queue").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_of(response).await["message"], "No items in queue");

    let response = server
        .post(
            "/pattern_queue",
            json!({ "queue": [{ "idea": "first", "patterns": 2 }, { "idea": "second" }] }),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await["message"], "Added 2 items to queue");

    let body = json_of(server.get("/pattern_queue/count").send().await.unwrap()).await;
    assert_eq!(body, json!({ "message": "2 items in queue", "count": 2 }));

    let response = server.get("/pattern_queue?publish=true").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_of(response).await["message"],
        "Generated Patterns Successfully"
    );
    assert_eq!(
        server.harness.generator.calls(),
        vec![("first".to_owned(), 2)]
    );
    assert_eq!(
        *server.harness.fulfillment.published.lock().unwrap(),
        vec!["prod-1", "prod-2"]
    );

    let body = json_of(server.get("/pattern_queue/count").send().await.unwrap()).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn queue_rejects_invalid_entries() {
    let server = default_server().await;
    for body in [
        json!({ "queue": [{ "idea": "" }] }),
        json!({ "queue": [{ "idea": "ok", "patterns": 0 }] }),
    ] {
        let response = server.post("/pattern_queue", body).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    let body = json_of(server.get("/pattern_queue/count").send().await.unwrap()).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn full_healthcheck_lists_every_service() {
    let server = default_server().await;

    let response = server.get("/full_healthcheck").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["details"]["printify"], "OK");
    assert_eq!(body["details"]["openai"], "OK");
    assert_eq!(body["details"]["github"], "OK");
    assert_eq!(body["details"]["database"], "OK");
    assert_eq!(body["details"]["shopify"], "Not configured");
}

#[tokio::test]
async fn full_healthcheck_fails_when_a_service_is_down() {
    let harness = Harness::new(
        FakeGenerator::returning(Vec::new()),
        FakeImageHost::default(),
        FakeFulfillment::default(),
    );
    let server = Server::start(harness, Some(FakeStorefront { healthy: false })).await;

    let response = server.get("/full_healthcheck").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_of(response).await;
    assert_eq!(body["status"], "Error");
    assert!(body["details"]["shopify"].as_str().unwrap().starts_with("Error"));
    assert_eq!(body["details"]["printify"], "OK");
}

#[tokio::test]
async fn db_healthcheck_requires_auth() {
    let server = default_server().await;

    let response = server.get("/healthcheck/db").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await, json!({ "status": "OK" }));

    let response = server
        .client
        .get(format!("{}/healthcheck/db", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
