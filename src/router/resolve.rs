//! Turns a route's declared middleware list into concrete middlewares.

use crate::auth::jwt::TokenVerifier;
use crate::auth::middleware::{optional, required};
use crate::auth::roles::{authorize, RolePolicy};
use crate::router::middleware::{Middleware, MiddlewareSpec};
use crate::router::registry::RouterError;
use std::sync::Arc;

/// Auth collaborators shared by every route of one mount.
#[derive(Debug, Clone)]
pub struct AuthContext {
    verifier: Option<Arc<TokenVerifier>>,
    roles: Arc<RolePolicy>,
}

impl AuthContext {
    /// Without a secret, any route needing token verification fails to resolve.
    pub fn new(secret: Option<&str>, roles: Arc<RolePolicy>) -> Self {
        Self {
            verifier: secret.map(|secret| Arc::new(TokenVerifier::new(secret))),
            roles,
        }
    }

    fn verifier(&self) -> Result<Arc<TokenVerifier>, RouterError> {
        self.verifier.clone().ok_or(RouterError::MissingSecret)
    }
}

/// Resolves placeholders and defaults, keeping declaration order.
///
/// `RequiresLogin` becomes the required-auth middleware and `NoAuth` is
/// dropped; either one counts as an auth decision. Routes without any
/// decision get the optional-auth middleware appended, so tokens are always
/// parsed unless a route opts out.
pub fn resolve_middlewares(
    specs: &[MiddlewareSpec],
    ctx: &AuthContext,
) -> Result<Vec<Middleware>, RouterError> {
    let mut decided = false;
    let mut resolved = Vec::with_capacity(specs.len() + 1);

    for spec in specs {
        match spec {
            MiddlewareSpec::RequiresLogin => {
                decided = true;
                resolved.push(required(ctx.verifier()?));
            }
            MiddlewareSpec::NoAuth => decided = true,
            MiddlewareSpec::Authorize(requirement) => {
                resolved.push(authorize(requirement.clone(), ctx.roles.clone()));
            }
            MiddlewareSpec::Custom(middleware) => resolved.push(middleware.clone()),
        }
    }

    if !decided {
        resolved.push(optional(ctx.verifier()?));
    }

    Ok(resolved)
}
