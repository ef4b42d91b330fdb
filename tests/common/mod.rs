//! Shared helpers for the HTTP-level tests.

#![allow(dead_code)]

use axum::http::HeaderValue;
use axum::Router;
use axum_test::TestServer;
use chrono::Duration;
use feyna::{AuthOptions, Environment, Identity, RouterRegistry, TokenVerifier};

pub const SECRET: &str = "integration-test-secret-at-least-32-chars";

/// Registry configured with the test secret.
pub fn registry() -> RouterRegistry {
    let mut registry = RouterRegistry::new().environment(Environment::Development);
    registry.configure(AuthOptions::secret(SECRET));
    registry
}

/// Token for `role`, signed with the test secret.
pub fn token(role: &str) -> String {
    token_with(SECRET, role, Some(Duration::minutes(5)))
}

pub fn token_with(secret: &str, role: &str, ttl: Option<Duration>) -> String {
    TokenVerifier::new(secret)
        .issue(Identity::with_role(role), ttl)
        .expect("should issue token")
}

pub fn bearer(token: &str) -> HeaderValue {
    header(&format!("Bearer {}", token))
}

pub fn header(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).expect("valid header value")
}

pub fn server(app: Router) -> TestServer {
    TestServer::new(app).expect("Failed to create test server")
}
