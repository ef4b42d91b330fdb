//! Named route tables and the mount protocol.
//!
//! A [`RouterRegistry`] collects router declarations (base path, routes,
//! per-route middlewares, auth requirements) and turns each one into an
//! [`axum::Router`] exactly once, when it is mounted onto an application.

use crate::auth::roles::{RolePolicy, RoleRequirement};
use crate::router::middleware::{Middleware, MiddlewareSpec, ResponseHook};
use crate::router::reply::timed;
use crate::router::resolve::{resolve_middlewares, AuthContext};
use crate::types::AppError;
use crate::utils::config::{ConfigError, Environment, FeynaConfig};
use axum::{
    handler::Handler,
    response::{IntoResponse, Response},
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{debug, info, warn};

/// Errors raised while declaring or mounting routers.
///
/// All of them are startup errors: a registry that mounts cleanly never
/// produces them at request time.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Router '{0}' is not registered")]
    UnknownRouter(String),

    #[error("Router '{0}' is already mounted")]
    AlreadyMounted(String),

    #[error("Router '{0}' has no base path; declare one with `.config(\"/path\")`")]
    MissingConfig(String),

    #[error("Invalid base path '{path}' for router '{router}': {reason}")]
    InvalidBasePath {
        router: String,
        path: String,
        reason: &'static str,
    },

    #[error("Handler '{key}' of router '{router}' has middlewares but no route")]
    MissingHandler { router: String, key: String },

    #[error("Duplicate route {method} {path} in router '{router}'")]
    DuplicateRoute {
        router: String,
        method: HttpMethod,
        path: String,
    },

    #[error("Route {path} in router '{router}' cannot be registered: {reason}")]
    ConflictingRoute {
        router: String,
        path: String,
        reason: &'static str,
    },

    #[error("No signing secret configured; call `RouterRegistry::configure` before mounting")]
    MissingSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
        }
    }

    fn filter(self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Patch => MethodFilter::PATCH,
            HttpMethod::Delete => MethodFilter::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auth requirement attached with [`RouterDefinition::requires_login`].
///
/// `true` is shorthand for `"*"`: any caller with a valid token passes the
/// role check. A string-only role check would answer 403 to every `true`
/// route instead; this one treats it as a usable requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginRequirement {
    /// No token handling at all, not even optional parsing
    Disabled,
    /// Valid token required, and the caller's role must meet the requirement
    Role(RoleRequirement),
}

impl Default for LoginRequirement {
    fn default() -> Self {
        LoginRequirement::Role(RoleRequirement::Any)
    }
}

impl From<bool> for LoginRequirement {
    /// `false` disables token handling, `true` requires any valid token.
    fn from(enabled: bool) -> Self {
        if enabled {
            LoginRequirement::default()
        } else {
            LoginRequirement::Disabled
        }
    }
}

impl From<&str> for LoginRequirement {
    fn from(role: &str) -> Self {
        LoginRequirement::Role(RoleRequirement::parse(role))
    }
}

impl From<String> for LoginRequirement {
    fn from(role: String) -> Self {
        LoginRequirement::Role(RoleRequirement::parse(&role))
    }
}

impl From<RoleRequirement> for LoginRequirement {
    fn from(requirement: RoleRequirement) -> Self {
        LoginRequirement::Role(requirement)
    }
}

/// Settings merged into the registry by [`RouterRegistry::configure`].
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    pub secret: Option<String>,
}

impl AuthOptions {
    pub fn secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
        }
    }
}

struct RouteTarget<S> {
    method: HttpMethod,
    path: String,
    handler: MethodRouter<S>,
}

/// One handler key of a router: its route and accumulated middlewares.
pub struct HandlerEntry<S> {
    key: String,
    target: Option<RouteTarget<S>>,
    middlewares: Vec<MiddlewareSpec>,
}

impl<S> HandlerEntry<S> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn method(&self) -> Option<HttpMethod> {
        self.target.as_ref().map(|t| t.method)
    }

    pub fn path(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.path.as_str())
    }

    pub fn middlewares(&self) -> &[MiddlewareSpec] {
        &self.middlewares
    }
}

/// Everything declared for one named router.
pub struct RouterEntry<S> {
    name: String,
    base_path: Option<String>,
    before: Option<Middleware>,
    after: Option<ResponseHook>,
    handlers: Vec<HandlerEntry<S>>,
    mounted: bool,
}

impl<S> RouterEntry<S> {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            base_path: None,
            before: None,
            after: None,
            handlers: Vec::new(),
            mounted: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    /// Handlers in first-declaration order.
    pub fn handlers(&self) -> &[HandlerEntry<S>] {
        &self.handlers
    }

    pub fn handler(&self, key: &str) -> Option<&HandlerEntry<S>> {
        self.handlers.iter().find(|h| h.key == key)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn handler_mut(&mut self, key: &str) -> &mut HandlerEntry<S> {
        let index = match self.handlers.iter().position(|h| h.key == key) {
            Some(index) => index,
            None => {
                self.handlers.push(HandlerEntry {
                    key: key.to_string(),
                    target: None,
                    middlewares: Vec::new(),
                });
                self.handlers.len() - 1
            }
        };
        &mut self.handlers[index]
    }
}

/// Fluent declarations for one router, returned by [`RouterRegistry::router`].
///
/// Declarations naming the same handler key accumulate: middlewares are
/// appended in call order, and a repeated route declaration replaces the
/// handler while keeping its middlewares.
pub struct RouterDefinition<'a, S> {
    entry: &'a mut RouterEntry<S>,
}

impl<S> RouterDefinition<'_, S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Sets the path the router is mounted under.
    pub fn config(self, base_path: impl Into<String>) -> Self {
        self.entry.base_path = Some(base_path.into());
        self
    }

    /// Middleware run before every route of this router.
    pub fn before(self, middleware: Middleware) -> Self {
        self.entry.before = Some(middleware);
        self
    }

    /// Hook run on every response of this router.
    pub fn after(self, hook: ResponseHook) -> Self {
        self.entry.after = Some(hook);
        self
    }

    /// Declares the route served by handler `key`.
    ///
    /// Express-style `:param` segments are accepted and rewritten to `{param}`.
    pub fn route<H, T>(self, key: &str, method: HttpMethod, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.entry.handler_mut(key).target = Some(RouteTarget {
            method,
            path: normalize_path(path),
            handler: on(method.filter(), handler),
        });
        self
    }

    pub fn get<H, T>(self, key: &str, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.route(key, HttpMethod::Get, path, handler)
    }

    pub fn post<H, T>(self, key: &str, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.route(key, HttpMethod::Post, path, handler)
    }

    pub fn put<H, T>(self, key: &str, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.route(key, HttpMethod::Put, path, handler)
    }

    pub fn patch<H, T>(self, key: &str, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.route(key, HttpMethod::Patch, path, handler)
    }

    pub fn delete<H, T>(self, key: &str, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.route(key, HttpMethod::Delete, path, handler)
    }

    /// Appends middlewares to handler `key`, run in the given order.
    pub fn apply_middlewares<I, M>(self, key: &str, middlewares: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareSpec>,
    {
        self.entry
            .handler_mut(key)
            .middlewares
            .extend(middlewares.into_iter().map(Into::into));
        self
    }

    /// Requires a valid token and a role, or with `false` disables token handling.
    pub fn requires_login(self, key: &str, requirement: impl Into<LoginRequirement>) -> Self {
        let specs = match requirement.into() {
            LoginRequirement::Disabled => vec![MiddlewareSpec::NoAuth],
            LoginRequirement::Role(role) => {
                vec![MiddlewareSpec::RequiresLogin, MiddlewareSpec::Authorize(role)]
            }
        };
        self.apply_middlewares(key, specs)
    }
}

/// Registry of router declarations, mounted onto axum applications.
pub struct RouterRegistry<S = ()> {
    routers: Vec<RouterEntry<S>>,
    auth: AuthOptions,
    roles: Arc<RolePolicy>,
    strict_mount: bool,
    environment: Environment,
}

impl<S> Default for RouterRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> RouterRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Empty registry: no secret, default role policy, strict mounting.
    pub fn new() -> Self {
        Self {
            routers: Vec::new(),
            auth: AuthOptions::default(),
            roles: Arc::new(RolePolicy::default()),
            strict_mount: true,
            environment: Environment::from_env(),
        }
    }

    /// Registry configured from `feyna.toml` settings and the secret's environment variable.
    pub fn from_config(config: &FeynaConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::new()
            .with_role_policy(config.role_policy())
            .strict_mount(config.router.strict_mount)
            .environment(config.server.environment);
        registry.configure(AuthOptions::secret(config.jwt_secret()?));
        Ok(registry)
    }

    /// Merges auth settings; fields left `None` keep their current value.
    ///
    /// Settings are read when a router is mounted, so routers mounted
    /// afterwards use the new secret.
    pub fn configure(&mut self, options: AuthOptions) -> &mut Self {
        if let Some(secret) = options.secret {
            self.auth.secret = Some(secret);
        }
        self
    }

    pub fn with_role_policy(mut self, policy: RolePolicy) -> Self {
        self.roles = Arc::new(policy);
        self
    }

    pub fn strict_mount(mut self, strict: bool) -> Self {
        self.strict_mount = strict;
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn role_policy(&self) -> &RolePolicy {
        &self.roles
    }

    /// Declarations for router `name`, created on first use.
    pub fn router(&mut self, name: &str) -> RouterDefinition<'_, S> {
        let index = match self.position(name) {
            Some(index) => index,
            None => {
                self.routers.push(RouterEntry::new(name));
                self.routers.len() - 1
            }
        };

        RouterDefinition {
            entry: &mut self.routers[index],
        }
    }

    pub fn entry(&self, name: &str) -> Option<&RouterEntry<S>> {
        self.routers.iter().find(|r| r.name == name)
    }

    /// Router names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routers.iter().map(|r| r.name.as_str())
    }

    /// Builds router `name` and attaches it to `app` under its base path.
    pub fn mount(&mut self, name: &str, app: Router<S>) -> Result<Router<S>, RouterError> {
        let index = self
            .position(name)
            .ok_or_else(|| RouterError::UnknownRouter(name.to_string()))?;
        self.mount_index(index, app)
    }

    /// Mounts every router not mounted yet, in registration order.
    pub fn mount_all(&mut self, mut app: Router<S>) -> Result<Router<S>, RouterError> {
        for index in 0..self.routers.len() {
            if !self.routers[index].mounted {
                app = self.mount_index(index, app)?;
            }
        }
        Ok(app)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.routers.iter().position(|r| r.name == name)
    }

    fn mount_index(&mut self, index: usize, app: Router<S>) -> Result<Router<S>, RouterError> {
        let (base_path, router) = self.build(index)?;
        let entry = &mut self.routers[index];
        entry.mounted = true;

        info!(
            router = %entry.name,
            base_path = %base_path,
            routes = entry.handlers.len(),
            "Mounted router"
        );

        if base_path == "/" {
            Ok(app.merge(router))
        } else {
            Ok(app.nest(&base_path, router))
        }
    }

    fn build(&self, index: usize) -> Result<(String, Router<S>), RouterError> {
        let entry = &self.routers[index];
        if entry.mounted {
            return Err(RouterError::AlreadyMounted(entry.name.clone()));
        }

        let base_path = match entry.base_path.as_deref() {
            Some(path) => normalize_base_path(&entry.name, path)?,
            None if self.strict_mount => return Err(RouterError::MissingConfig(entry.name.clone())),
            None => {
                warn!(
                    router = %entry.name,
                    "Router has no base path configured, mounting at /"
                );
                "/".to_string()
            }
        };

        let ctx = AuthContext::new(self.auth.secret.as_deref(), self.roles.clone());
        let mut seen = HashSet::new();
        let mut paths: Vec<&str> = Vec::new();
        let mut router = Router::new();

        for handler in &entry.handlers {
            let target = handler
                .target
                .as_ref()
                .ok_or_else(|| RouterError::MissingHandler {
                    router: entry.name.clone(),
                    key: handler.key.clone(),
                })?;

            if let Some(reason) = check_route_path(&target.path)
                .or_else(|| paths.iter().find_map(|existing| route_conflict(existing, &target.path)))
            {
                return Err(RouterError::ConflictingRoute {
                    router: entry.name.clone(),
                    path: target.path.clone(),
                    reason,
                });
            }

            if !seen.insert((target.method, target.path.clone())) {
                return Err(RouterError::DuplicateRoute {
                    router: entry.name.clone(),
                    method: target.method,
                    path: target.path.clone(),
                });
            }

            let middlewares = resolve_middlewares(&handler.middlewares, &ctx)?;
            let label = format!(
                "{} {}",
                target.method.as_str().to_uppercase(),
                join_paths(&base_path, &target.path)
            );

            debug!(
                router = %entry.name,
                key = %handler.key,
                route = %label,
                middlewares = ?middlewares.iter().map(Middleware::name).collect::<Vec<_>>(),
                "Registered route"
            );

            let mut route = timed(target.handler.clone(), label, self.environment);
            // The last layer applied runs first.
            for middleware in middlewares.into_iter().rev() {
                route = middleware.wrap_route(route);
            }
            router = router.route(&target.path, route);
            if !paths.contains(&target.path.as_str()) {
                paths.push(&target.path);
            }
        }

        if let Some(hook) = &entry.after {
            router = hook.clone().wrap_router(router);
        }
        if let Some(before) = &entry.before {
            router = before.clone().wrap_router(router);
        }

        Ok((base_path, router.layer(CatchPanicLayer::custom(panic_response))))
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(format!("Handler panicked: {}", detail)).into_response()
}

/// Rewrites express-style `:param` and `*` segments to axum captures and
/// ensures a leading `/`.
///
/// A bare `*` becomes `{*wildcard}`; `*name` becomes `{*name}`.
pub fn normalize_path(path: &str) -> String {
    let path = path
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':').filter(|name| !name.is_empty()) {
                return format!("{{{}}}", name);
            }
            match segment.strip_prefix('*') {
                Some("") => "{*wildcard}".to_string(),
                Some(name) => format!("{{*{}}}", name),
                None => segment.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("/");

    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

fn segment(raw: &str) -> Segment<'_> {
    match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(inner) => match inner.strip_prefix('*') {
            Some(name) => Segment::CatchAll(name),
            None => Segment::Param(inner),
        },
        None => Segment::Literal(raw),
    }
}

/// Rejects paths the axum router would refuse to insert.
fn check_route_path(path: &str) -> Option<&'static str> {
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    let last = segments.len().saturating_sub(1);

    for (index, raw) in segments.iter().enumerate() {
        match segment(raw) {
            Segment::CatchAll(_) if index != last => {
                return Some("a wildcard must be the last segment")
            }
            Segment::Param("") | Segment::CatchAll("") => return Some("empty parameter name"),
            Segment::Literal(literal) if literal.contains(['{', '}']) => {
                return Some("parameters must span a whole segment")
            }
            _ => {}
        }
    }
    None
}

/// Two paths conflict when they share a prefix and then capture the same
/// position under different names.
fn route_conflict(existing: &str, path: &str) -> Option<&'static str> {
    for (a, b) in existing.split('/').zip(path.split('/')) {
        if a == b {
            continue;
        }
        return match (segment(a), segment(b)) {
            (Segment::Param(_), Segment::Param(_)) => {
                Some("another route captures this segment under a different name")
            }
            (Segment::CatchAll(_), Segment::CatchAll(_)) => {
                Some("another route has a wildcard here under a different name")
            }
            (Segment::Param(_), Segment::CatchAll(_)) | (Segment::CatchAll(_), Segment::Param(_)) => {
                Some("a parameter and a wildcard cannot share a segment")
            }
            _ => None,
        };
    }
    None
}

fn normalize_base_path(router: &str, path: &str) -> Result<String, RouterError> {
    let invalid = |reason| RouterError::InvalidBasePath {
        router: router.to_string(),
        path: path.to_string(),
        reason,
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path.contains(['{', '}', '*', ':']) {
        return Err(invalid("must not contain parameters or wildcards"));
    }

    let trimmed = path.trim_end_matches('/');
    Ok(if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    })
}

fn join_paths(base: &str, path: &str) -> String {
    match (base, path) {
        ("/", path) => path.to_string(),
        (base, "/") => base.to_string(),
        (base, path) => format!("{}{}", base, path),
    }
}
