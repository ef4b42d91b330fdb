//! # feyna - declarative routers for axum
//!
//! feyna lets an application declare named routers, their routes, per-route
//! middlewares, login requirements and role checks in one place, then mounts
//! them onto an [`axum::Router`]. Every route gets:
//!
//! - its declared middlewares, run in declaration order
//! - an auth decision: a required token, no token handling at all, or (by
//!   default) optional token parsing
//! - JSON replies with the status picked by the handler
//! - JSON error responses for [`ApplicationError`]s and a 500 fallback for
//!   anything else, panics included
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use feyna::{AuthOptions, AuthUser, Reply, Result, RouterRegistry};
//! use serde_json::json;
//!
//! async fn index() -> Result<Reply> {
//!     Ok(Reply::new(json!({ "message": "Hello World" })))
//! }
//!
//! async fn me(AuthUser(claims): AuthUser) -> Result<Reply> {
//!     Reply::json(&claims.data)
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut registry = RouterRegistry::new();
//!     registry.configure(AuthOptions::secret("secret_key"));
//!
//!     registry
//!         .router("TestRouter")
//!         .config("/test")
//!         .get("index", "/", index)
//!         .get("me", "/me", me)
//!         .requires_login("me", "User");
//!
//!     let app = registry.mount_all(axum::Router::new())?;
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`router`] - Router declarations, middleware resolution and mounting
//! - [`auth`] - JWT verification, auth middlewares and role checks
//! - [`types`] - Claims and error types
//! - [`utils`] - TOML configuration

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// JWT authentication, auth middlewares and role checks.
pub mod auth;
/// Declarative routers and their mount protocol.
pub mod router;
/// Core types (claims, errors).
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use auth::jwt::TokenVerifier;
pub use auth::middleware::AuthUser;
pub use auth::roles::{RolePolicy, RoleRequirement};
pub use router::{
    AuthOptions, HttpMethod, LoginRequirement, Middleware, Reply, ResponseHook, RouterError,
    RouterRegistry,
};
pub use types::{AppError, ApplicationError, Claims, Identity, Result};
pub use utils::config::{ConfigError, Environment, FeynaConfig};
