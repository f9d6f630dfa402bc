//! Test application factory for integration tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use dyelab::models::{AppConfig, PacingConfig, RetryConfig};
use dyelab::server::{app_state_with_generator, build_router, AppState};
use dyelab::services::Workspace;

use super::mock_generator::MockGenerator;

/// Test application with router and direct access to services
pub struct TestApp {
    router: axum::Router,
    pub state: AppState,
    pub generator: Arc<MockGenerator>,
}

impl TestApp {
    /// App backed by a mock generator, with short pacing and a small retry budget
    pub fn new() -> Self {
        Self::with_generator(MockGenerator::new())
    }

    pub fn with_generator(generator: MockGenerator) -> Self {
        Self::with_config(test_config(), generator)
    }

    pub fn with_config(config: AppConfig, generator: MockGenerator) -> Self {
        let generator = Arc::new(generator);
        let state = app_state_with_generator(config, generator.clone());
        let router = build_router(state.clone());

        Self {
            router,
            state,
            generator,
        }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.state.workspace
    }

    /// Make a GET request to the given path
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Request::delete(path).body(Body::empty()).unwrap())
            .await
    }

    /// Make a POST request with a raw body
    pub async fn post_bytes(&self, path: &str, body: Vec<u8>) -> TestResponse {
        let request = Request::post(path)
            .header("Content-Type", "application/octet-stream")
            .body(Body::from(body))
            .unwrap();
        self.request(request).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> TestResponse {
        let request = Request::post(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(request).await
    }

    /// Make a PUT request with JSON body
    pub async fn put_json(&self, path: &str, body: serde_json::Value) -> TestResponse {
        let request = Request::put(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(request).await
    }

    /// Upload an image and return its id
    pub async fn upload(&self, name: &str, bytes: Vec<u8>) -> String {
        let response = self
            .post_bytes(&format!("/api/images?name={name}"), bytes)
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        let json: serde_json::Value = response.json();
        json["id"].as_str().unwrap().to_string()
    }

    /// Start a batch and wait for it to finish
    pub async fn run_batch(&self, body: serde_json::Value) -> TestResponse {
        let response = self.post_json("/api/batch", body).await;
        if response.status == StatusCode::ACCEPTED {
            self.workspace().wait_idle().await;
        }
        response
    }

    /// Send a request to the router
    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration with fast pacing for tests
pub fn test_config() -> AppConfig {
    AppConfig {
        retry: RetryConfig {
            max_attempts: 2,
            base_delay_ms: 10,
        },
        pacing: PacingConfig {
            standard_delay_ms: 5,
            pro_delay_ms: 10,
        },
        ..AppConfig::defaults()
    }
}

/// Test response with convenience methods
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON response")
    }

    /// Get body as string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Get raw body bytes
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Check if response is a PNG image
    pub fn is_png(&self) -> bool {
        self.body.len() >= 8 && &self.body[0..8] == b"\x89PNG\r\n\x1a\n"
    }
}
