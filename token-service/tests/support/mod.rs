#![allow(dead_code)]

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use token_service::{service_config_from, ServiceConfig};
use tower::util::ServiceExt;

pub const USERS: &str = "test:test;alice:wonderland:admin|manager";

/// HS256 config with two users; `extra` entries override the defaults.
pub fn test_config(extra: &[(&str, &str)]) -> ServiceConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("TOKEN_SIGNING_SECRET".to_string(), "token-service-test-secret".to_string()),
        ("TOKEN_ISSUER".to_string(), "peanut-test".to_string()),
        ("TOKEN_AUDIENCE".to_string(), "peanut-api".to_string()),
        ("TOKEN_SERVICE_USERS".to_string(), USERS.to_string()),
    ]);
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }
    service_config_from(move |key| vars.get(key).cloned()).expect("test config")
}

pub fn login_request(path: &str, username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={username}&password={password}")))
        .expect("request")
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_text(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

/// Log in and return the access token.
pub async fn access_token(app: &Router, username: &str, password: &str) -> String {
    let resp = app
        .clone()
        .oneshot(login_request("/token", username, password))
        .await
        .expect("response");
    let body = body_json(resp).await;
    body["access_token"]
        .as_str()
        .expect("access_token in body")
        .to_string()
}
