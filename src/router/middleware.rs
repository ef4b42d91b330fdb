//! Type-erased middleware values stored in route tables.

use crate::auth::roles::RoleRequirement;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::MethodRouter,
    Router,
};
use futures::future::{BoxFuture, FutureExt};
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

type MiddlewareFn = dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync;
type ResponseHookFn = dyn Fn(Response) -> BoxFuture<'static, Response> + Send + Sync;

/// A request-processing step run before a route handler.
///
/// Wraps any `async fn(Request, Next) -> impl IntoResponse`, the same shape
/// `axum::middleware::from_fn` accepts, behind a name so resolved route
/// tables can be inspected.
#[derive(Clone)]
pub struct Middleware {
    name: Cow<'static, str>,
    func: Arc<MiddlewareFn>,
}

impl Middleware {
    pub fn from_fn<F, Fut, Out>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
        Out: IntoResponse,
    {
        let func = move |req: Request, next: Next| -> BoxFuture<'static, Response> {
            let fut = f(req, next);
            async move { fut.await.into_response() }.boxed()
        };

        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn run(&self, req: Request, next: Next) -> Response {
        (self.func)(req, next).await
    }

    /// Layers this middleware around the methods a route declares.
    ///
    /// Requests with an undeclared method skip it and get `405`.
    pub(crate) fn wrap_route<S>(self, route: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        route.route_layer(axum::middleware::from_fn(move |req: Request, next: Next| {
            let middleware = self.clone();
            async move { middleware.run(req, next).await }
        }))
    }

    /// Layers this middleware around every route of a router.
    pub(crate) fn wrap_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(axum::middleware::from_fn(move |req: Request, next: Next| {
            let middleware = self.clone();
            async move { middleware.run(req, next).await }
        }))
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

/// Runs after a route handler and may rewrite its response.
#[derive(Clone)]
pub struct ResponseHook {
    func: Arc<ResponseHookFn>,
}

impl ResponseHook {
    pub fn from_fn<F, Fut, Out>(f: F) -> Self
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
        Out: IntoResponse,
    {
        let func = move |res: Response| -> BoxFuture<'static, Response> {
            let fut = f(res);
            async move { fut.await.into_response() }.boxed()
        };

        Self {
            func: Arc::new(func),
        }
    }

    pub async fn run(&self, res: Response) -> Response {
        (self.func)(res).await
    }

    pub(crate) fn wrap_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(axum::middleware::map_response(move |res: Response| {
            let hook = self.clone();
            async move { hook.run(res).await }
        }))
    }
}

/// One entry of a route's declared middleware list.
///
/// `RequiresLogin` and `NoAuth` are placeholders: they record an auth decision
/// and are replaced (or dropped) when the route is mounted.
#[derive(Debug, Clone)]
pub enum MiddlewareSpec {
    RequiresLogin,
    NoAuth,
    Authorize(RoleRequirement),
    Custom(Middleware),
}

impl From<Middleware> for MiddlewareSpec {
    fn from(middleware: Middleware) -> Self {
        MiddlewareSpec::Custom(middleware)
    }
}

impl From<RoleRequirement> for MiddlewareSpec {
    fn from(requirement: RoleRequirement) -> Self {
        MiddlewareSpec::Authorize(requirement)
    }
}
