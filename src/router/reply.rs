//! Handler replies and the per-route timing layer.

use crate::types::AppError;
use crate::utils::config::Environment;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::MethodRouter,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use uuid::Uuid;

/// JSON value returned by a route handler.
///
/// When the value is an object with a truthy `status` key, that key sets the
/// HTTP status and is removed from the body. Otherwise the status is 200.
/// A `null` reply produces `204 No Content`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    body: Value,
}

impl Reply {
    pub fn new(body: impl Into<Value>) -> Self {
        Self { body: body.into() }
    }

    /// Serializes any value into a reply.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, AppError> {
        serde_json::to_value(value)
            .map(Self::new)
            .map_err(|e| AppError::Internal(format!("Failed to serialize reply: {}", e)))
    }

    pub fn empty() -> Self {
        Self { body: Value::Null }
    }

    /// Sets the `status` key; non-object bodies are left untouched.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        if let Value::Object(map) = &mut self.body {
            map.insert("status".to_string(), Value::from(status.as_u16()));
        }
        self
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Splits the reply into the status to send and the remaining body.
    pub fn into_parts(self) -> Result<(StatusCode, Value), AppError> {
        let mut body = self.body;

        let status = match &mut body {
            Value::Null => return Ok((StatusCode::NO_CONTENT, Value::Null)),
            Value::Object(map) => map.remove("status"),
            _ => None,
        };

        let status = match status {
            None => StatusCode::OK,
            Some(raw) if is_falsy(&raw) => StatusCode::OK,
            Some(raw) => raw
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .and_then(|code| StatusCode::from_u16(code).ok())
                .ok_or_else(|| AppError::Internal(format!("Invalid reply status: {}", raw)))?,
        };

        Ok((status, body))
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

impl From<Value> for Reply {
    fn from(body: Value) -> Self {
        Self::new(body)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self.into_parts() {
            Ok((StatusCode::NO_CONTENT, _)) => StatusCode::NO_CONTENT.into_response(),
            Ok((status, body)) => (status, Json(body)).into_response(),
            Err(err) => err.into_response(),
        }
    }
}

/// Wraps a route in a layer logging how long each request took.
///
/// Production builds get the route back untouched.
pub(crate) fn timed<S>(route: MethodRouter<S>, label: String, environment: Environment) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    if environment.is_production() {
        return route;
    }

    route.route_layer(axum::middleware::from_fn(move |req: Request, next: Next| {
        let route = label.clone();
        async move {
            let request_id = Uuid::new_v4();
            let started = Instant::now();
            let response = next.run(req).await;
            tracing::debug!(
                %request_id,
                route = %route,
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "Request handled"
            );
            response
        }
    }))
}
