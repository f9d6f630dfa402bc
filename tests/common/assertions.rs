//! Assertion helpers for tests.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use super::app::TestResponse;

/// Assert response has expected status code
pub fn assert_status(response: &TestResponse, expected: StatusCode) {
    assert_eq!(
        response.status,
        expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        response.status,
        response.text()
    );
}

/// Assert response is OK (200)
pub fn assert_ok(response: &TestResponse) {
    assert_status(response, StatusCode::OK);
}

/// Assert an error response with the JSON `{ status, error }` body
pub fn assert_json_error(response: &TestResponse, expected: StatusCode) -> String {
    assert_status(response, expected);
    let json: serde_json::Value = response.json();
    assert_eq!(
        json["status"].as_u64(),
        Some(expected.as_u16() as u64),
        "Expected JSON status {}, got {}",
        expected.as_u16(),
        serde_json::to_string_pretty(&json).unwrap()
    );
    json["error"]
        .as_str()
        .expect("error message should be a string")
        .to_string()
}

/// Assert response body is a PNG with the right content type
pub fn assert_png(response: &TestResponse) {
    assert_ok(response);
    assert!(
        response.is_png(),
        "Expected PNG image, got {} bytes starting with {:?}",
        response.body.len(),
        &response.body[..8.min(response.body.len())]
    );
    let content_type = response
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok());
    assert_eq!(content_type, Some("image/png"));
}
