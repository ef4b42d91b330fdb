//! Declarative routers
//!
//! Routers are declared by name on a [`RouterRegistry`], then mounted onto an
//! [`axum::Router`]. Each route gets its declared middlewares, an auth
//! decision (required, disabled, or optional token parsing by default) and
//! JSON error translation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use feyna::router::{AuthOptions, Reply, RouterRegistry};
//! use serde_json::json;
//!
//! async fn index() -> feyna::Result<Reply> {
//!     Ok(Reply::new(json!({ "message": "Hello World" })))
//! }
//!
//! let mut registry = RouterRegistry::new();
//! registry.configure(AuthOptions::secret("secret_key"));
//! registry
//!     .router("TestRouter")
//!     .config("/test")
//!     .get("index", "/", index)
//!     .requires_login("index", false);
//!
//! let app = registry.mount("TestRouter", axum::Router::new())?;
//! ```
//!
//! # Middleware order
//!
//! Declared middlewares run in declaration order. `requires_login` adds the
//! token check followed by the role check. Routes without any auth decision
//! get optional token parsing appended after their own middlewares.

/// Type-erased middlewares, response hooks and declared middleware entries.
pub mod middleware;
/// Route tables, declarations and the mount protocol.
pub mod registry;
/// Handler replies and per-route timing.
pub mod reply;
/// Resolution of declared middleware lists.
pub mod resolve;

pub use middleware::{Middleware, MiddlewareSpec, ResponseHook};
pub use registry::{
    AuthOptions, HandlerEntry, HttpMethod, LoginRequirement, RouterDefinition, RouterEntry,
    RouterError, RouterRegistry,
};
pub use reply::Reply;
pub use resolve::{resolve_middlewares, AuthContext};
