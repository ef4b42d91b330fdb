//! JWT Authentication and Middleware
//!
//! This module provides the authentication pieces routers are built from.
//!
//! # Module Structure
//!
//! - [`auth::jwt`](crate::auth::jwt) - HS256 token verification and issuing
//! - [`auth::middleware`](crate::auth::middleware) - Bearer extraction, required/optional
//!   verification middlewares and the [`AuthUser`](crate::auth::middleware::AuthUser) extractor
//! - [`auth::roles`](crate::auth::roles) - Role requirements, the role hierarchy and the
//!   `authorize` middleware
//!
//! # Tokens
//!
//! Tokens are HS256-signed with the registry's secret and carry the caller's
//! identity under the `data` claim:
//!
//! ```json
//! { "data": { "role": "Admin", "email": "a@example.com" }, "iat": 1700000000 }
//! ```
//!
//! The role used by role checks is `data.role`.
//!
//! ## Extracting Claims in Handlers
//!
//! ```ignore
//! async fn me(AuthUser(claims): AuthUser) -> feyna::Result<Reply> {
//!     Reply::json(&claims.data)
//! }
//! ```

/// Token verification and issuing.
pub mod jwt;
/// Authentication middlewares and extractors.
pub mod middleware;
/// Role requirements and role hierarchy.
pub mod roles;
