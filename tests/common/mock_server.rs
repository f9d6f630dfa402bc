//! Mock image service speaking the `generateContent` wire format.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const TEST_API_KEY: &str = "test-key";
pub const STANDARD_MODEL_PATH: &str = "/v1beta/models/gemini-2.5-flash-image:generateContent";
pub const PRO_MODEL_PATH: &str = "/v1beta/models/gemini-3-pro-image-preview:generateContent";

/// Wrapper around wiremock MockServer with convenience methods
pub struct MockImageService {
    pub server: MockServer,
}

impl MockImageService {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Answer with an inline image
    pub async fn mock_image(&self, endpoint: &str, mime_type: &str, bytes: &[u8]) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .and(header("x-goog-api-key", TEST_API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response(mime_type, bytes)))
            .mount(&self.server)
            .await;
    }

    /// Answer with the structured error envelope
    pub async fn mock_error(&self, endpoint: &str, code: u16, status: &str, message: &str) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(code).set_body_json(json!({
                "error": { "code": code, "message": message, "status": status }
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer 200 with text only
    pub async fn mock_text_only(&self, endpoint: &str) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "I can't do that." }] } }]
            })))
            .mount(&self.server)
            .await;
    }

    /// Bodies of all received requests
    pub async fn request_bodies(&self) -> Vec<serde_json::Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}

pub fn image_response(mime_type: &str, bytes: &[u8]) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {
                "parts": [
                    { "text": "Here is the recolored garment." },
                    { "inlineData": { "mimeType": mime_type, "data": BASE64.encode(bytes) } }
                ]
            }
        }]
    })
}
