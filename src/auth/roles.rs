//! Role requirements and the role hierarchy used to check them.

use crate::router::Middleware;
use crate::types::{AppError, ApplicationError, Claims};
use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Message of the 403 returned when a role check fails.
pub const UNAUTHORIZED_ACCESS: &str = "Unauthorized access.";

/// Roles a route accepts.
///
/// Parsed from a comma-separated list such as `"User,Editor"`; `"*"` accepts
/// every caller, authenticated or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoleRequirement {
    #[default]
    Any,
    Roles(Vec<String>),
}

impl RoleRequirement {
    pub fn parse(spec: &str) -> Self {
        match spec {
            "*" => RoleRequirement::Any,
            "" => RoleRequirement::Roles(Vec::new()),
            roles => RoleRequirement::Roles(roles.split(',').map(str::to_string).collect()),
        }
    }
}

impl From<&str> for RoleRequirement {
    fn from(spec: &str) -> Self {
        RoleRequirement::parse(spec)
    }
}

impl From<String> for RoleRequirement {
    fn from(spec: String) -> Self {
        RoleRequirement::parse(&spec)
    }
}

impl fmt::Display for RoleRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleRequirement::Any => write!(f, "*"),
            RoleRequirement::Roles(roles) => write!(f, "{}", roles.join(",")),
        }
    }
}

/// Declared role hierarchy: which roles also satisfy a required role.
///
/// The default policy lets an `Admin` through wherever a `User` is required.
/// Grants are transitive, so `Guest <- User <- Admin` lets an `Admin` in
/// wherever a `Guest` is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    satisfied_by: HashMap<String, BTreeSet<String>>,
}

impl RolePolicy {
    /// A policy without any hierarchy: roles only satisfy themselves.
    pub fn flat() -> Self {
        Self {
            satisfied_by: HashMap::new(),
        }
    }

    /// Declares that every role in `by` also satisfies `role`.
    pub fn grant<I, R>(mut self, role: impl Into<String>, by: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.satisfied_by
            .entry(role.into())
            .or_default()
            .extend(by.into_iter().map(Into::into));
        self
    }

    /// Builds a policy from a `role -> satisfying roles` table.
    pub fn from_table(table: &HashMap<String, Vec<String>>) -> Self {
        table
            .iter()
            .fold(Self::flat(), |policy, (role, by)| policy.grant(role.clone(), by.clone()))
    }

    /// Every role accepted for the given requirement roles.
    pub fn permitted(&self, roles: &[String]) -> HashSet<String> {
        let mut permitted = HashSet::new();
        let mut pending: Vec<&str> = roles.iter().map(String::as_str).collect();

        while let Some(role) = pending.pop() {
            if !permitted.insert(role.to_string()) {
                continue;
            }
            if let Some(by) = self.satisfied_by.get(role) {
                pending.extend(by.iter().map(String::as_str));
            }
        }

        permitted
    }

    /// Whether an identity holding `role` meets `requirement`.
    pub fn allows(&self, requirement: &RoleRequirement, role: Option<&str>) -> bool {
        match requirement {
            RoleRequirement::Any => true,
            RoleRequirement::Roles(roles) => {
                role.is_some_and(|role| self.permitted(roles).contains(role))
            }
        }
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::flat().grant("User", ["Admin"])
    }
}

/// Checks the caller's role against `requirement`.
pub fn check(
    requirement: &RoleRequirement,
    policy: &RolePolicy,
    claims: Option<&Claims>,
) -> Result<(), AppError> {
    if policy.allows(requirement, claims.and_then(Claims::role)) {
        return Ok(());
    }

    Err(ApplicationError::new(UNAUTHORIZED_ACCESS)
        .with_status(StatusCode::FORBIDDEN)
        .into())
}

/// Middleware enforcing `requirement` on the identity left by the auth middlewares.
pub fn authorize(requirement: RoleRequirement, policy: Arc<RolePolicy>) -> Middleware {
    let name = format!("authorize:{}", requirement);

    Middleware::from_fn(name, move |req: Request, next: Next| {
        let outcome = check(&requirement, &policy, req.extensions().get::<Claims>());
        async move {
            outcome?;
            Ok::<Response, AppError>(next.run(req).await)
        }
    })
}
