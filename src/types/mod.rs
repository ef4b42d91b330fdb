use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============= Identity Types =============

/// Identity payload carried under the `data` claim of a token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Any other application data signed into the token
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Identity {
    pub fn with_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            extra: Map::new(),
        }
    }
}

/// Verified token claims, inserted into request extensions by the auth middlewares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub data: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
}

impl Claims {
    /// Role used for authorization checks (`data.role`).
    pub fn role(&self) -> Option<&str> {
        self.data.role.as_deref()
    }
}

// ============= Error Types =============

/// Deliberate, client-facing failure raised by handlers and middlewares.
///
/// `info` is arbitrary JSON. When it is an object carrying a `status` key,
/// that key selects the HTTP status of the response and is stripped from the
/// `data` field of the body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApplicationError {
    message: String,
    info: Option<Value>,
}

impl ApplicationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            info: None,
        }
    }

    pub fn with_info(message: impl Into<String>, info: Value) -> Self {
        Self {
            message: message.into(),
            info: Some(info),
        }
    }

    /// Sets `info.status`, turning `info` into an object if needed.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        let mut info = match self.info.take() {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(other) => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        info.insert("status".to_string(), Value::from(status.as_u16()));
        self.info = Some(Value::Object(info));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn info(&self) -> Option<&Value> {
        self.info.as_ref()
    }

    /// HTTP status selected by `info.status`, 400 when absent or unusable.
    pub fn status(&self) -> StatusCode {
        self.info
            .as_ref()
            .and_then(|info| info.get("status"))
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::BAD_REQUEST)
    }

    /// Splits the error into its status and `{ message, data }` body.
    pub fn into_parts(self) -> (StatusCode, ErrorBody) {
        let status = self.status();
        let data = self.info.map(|info| match info {
            Value::Object(mut map) => {
                map.remove("status");
                Value::Object(map)
            }
            other => other,
        });

        (
            status,
            ErrorBody {
                message: self.message,
                data,
            },
        )
    }
}

/// JSON envelope of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Token verification failure; `code` is `credentials_required` or `invalid_token`.
    #[error("Authentication error: {message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn credentials_required() -> Self {
        AppError::Unauthorized {
            code: "credentials_required",
            message: "No authorization token was found".to_string(),
        }
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            code: "invalid_token",
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Application(err) => err.into_parts(),
            AppError::Unauthorized { code, message } => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    message,
                    data: Some(serde_json::json!({ "code": code })),
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed with an internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        message: "Internal server error".to_string(),
                        data: None,
                    },
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
