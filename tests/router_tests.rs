mod common;

use axum::{
    extract::{Path, Request},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
    Router,
};
use common::{bearer, header, registry, server, token};
use feyna::{
    ApplicationError, AuthUser, Middleware, Reply, ResponseHook, Result, RouterError,
    RouterRegistry,
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

// ============= Handlers =============

async fn hello() -> Result<Reply> {
    Ok(Reply::new(json!({ "message": "Hello World" })))
}

async fn foo() -> Result<Reply> {
    Ok(Reply::new(json!({ "foo": 1 })))
}

async fn created() -> Result<Reply> {
    Ok(Reply::new(json!({ "foo": 1, "status": 201 })))
}

async fn not_found() -> Result<Reply> {
    Err(ApplicationError::with_info("bad", json!({ "status": 404, "extra": "x" })).into())
}

async fn bad_request() -> Result<Reply> {
    Err(ApplicationError::new("bad").into())
}

async fn broken() -> Result<Reply> {
    Err(anyhow::anyhow!("disk on fire").into())
}

async fn nothing() -> Result<Reply> {
    Ok(Reply::empty())
}

async fn whoami(user: Option<AuthUser>) -> Result<Reply> {
    Ok(Reply::new(json!({
        "role": user.and_then(|AuthUser(claims)| claims.data.role),
    })))
}

async fn echo_order(headers: HeaderMap) -> Result<Reply> {
    let order = headers
        .get("x-order")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Ok(Reply::new(json!({ "order": order })))
}

async fn show(Path(id): Path<String>) -> Result<Reply> {
    Ok(Reply::new(json!({ "id": id })))
}

/// Middleware appending its name to the `x-order` request header.
fn tag(name: &'static str) -> Middleware {
    Middleware::from_fn(name, move |mut req: Request, next: Next| async move {
        let order = match req.headers().get("x-order").and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{},{}", existing, name),
            None => name.to_string(),
        };
        req.headers_mut()
            .insert("x-order", HeaderValue::from_str(&order).expect("valid header"));
        next.run(req).await
    })
}

fn mount(mut registry: RouterRegistry, name: &str) -> axum_test::TestServer {
    let app = registry.mount(name, Router::new()).expect("should mount");
    server(app)
}

// ============= Replies =============

#[tokio::test]
async fn test_hello_world() {
    let mut registry = registry();
    registry.router("TestRouter").config("/test").get("index", "/", hello);
    let server = mount(registry, "TestRouter");

    let response = server.get("/test").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "message": "Hello World" }));
}

#[tokio::test]
async fn test_reply_defaults_to_200() {
    let mut registry = registry();
    registry.router("R").config("/r").get("foo", "/foo", foo);
    let server = mount(registry, "R");

    let response = server.get("/r/foo").await;
    response.assert_status_ok();
    assert_eq!(response.text(), r#"{"foo":1}"#);
}

#[tokio::test]
async fn test_reply_status_key_sets_status() {
    let mut registry = registry();
    registry.router("R").config("/r").post("create", "/foo", created);
    let server = mount(registry, "R");

    let response = server.post("/r/foo").await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.text(), r#"{"foo":1}"#);
}

#[tokio::test]
async fn test_empty_reply_is_no_content() {
    let mut registry = registry();
    registry.router("R").config("/r").put("touch", "/", nothing);
    let server = mount(registry, "R");

    let response = server.put("/r").await;
    response.assert_status(StatusCode::NO_CONTENT);
    assert!(response.text().is_empty());
}

// ============= Error translation =============

#[tokio::test]
async fn test_application_error_translation() {
    let mut registry = registry();
    registry.router("R").config("/r").get("missing", "/missing", not_found);
    let server = mount(registry, "R");

    let response = server.get("/r/missing").await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({ "message": "bad", "data": { "extra": "x" } }));
}

#[tokio::test]
async fn test_application_error_defaults_to_400() {
    let mut registry = registry();
    registry.router("R").config("/r").patch("bad", "/", bad_request);
    let server = mount(registry, "R");

    let response = server.patch("/r").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "message": "bad" }));
}

#[tokio::test]
async fn test_unexpected_error_gets_500() {
    let mut registry = registry();
    registry.router("R").config("/r").get("broken", "/broken", broken);
    let server = mount(registry, "R");

    let response = server.get("/r/broken").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({ "message": "Internal server error" }));
}

#[tokio::test]
async fn test_panic_gets_500() {
    async fn boom() -> Result<Reply> {
        panic!("handler exploded")
    }

    let mut registry = registry();
    registry.router("R").config("/r").get("boom", "/boom", boom);
    let server = mount(registry, "R");

    let response = server.get("/r/boom").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({ "message": "Internal server error" }));
}

// ============= Auth decisions =============

#[tokio::test]
async fn test_opted_out_route_never_checks_tokens() {
    let mut registry = registry();
    registry
        .router("R")
        .config("/r")
        .get("open", "/open", whoami)
        .requires_login("open", false);
    let server = mount(registry, "R");

    let response = server
        .get("/r/open")
        .add_header(AUTHORIZATION, bearer("not-a-token"))
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({ "role": null }));

    // Even a valid token is not parsed.
    let response = server
        .get("/r/open")
        .add_header(AUTHORIZATION, bearer(&token("Admin")))
        .await;
    response.assert_json(&json!({ "role": null }));
}

#[tokio::test]
async fn test_default_route_parses_tokens_optionally() {
    let mut registry = registry();
    registry.router("R").config("/r").get("me", "/me", whoami);
    let server = mount(registry, "R");

    let response = server.get("/r/me").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "role": null }));

    let response = server
        .get("/r/me")
        .add_header(AUTHORIZATION, bearer(&token("User")))
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({ "role": "User" }));

    let response = server
        .get("/r/me")
        .add_header(AUTHORIZATION, bearer("not-a-token"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_header_on_optional_route() {
    let mut registry = registry();
    registry.router("R").config("/r").get("me", "/me", whoami);
    let server = mount(registry, "R");

    for value in ["Token abc", "Bearer", "bearer abc"] {
        let response = server.get("/r/me").add_header(AUTHORIZATION, header(value)).await;
        response.assert_status_ok();
        response.assert_json(&json!({ "role": null }));
    }
}

// ============= Registration =============

#[tokio::test]
async fn test_routes_accumulate_in_declaration_order() {
    let mut registry = registry();
    registry
        .router("R")
        .config("/r")
        .get("first", "/first", hello)
        .get("second", "/second", foo);

    let keys: Vec<&str> = registry
        .entry("R")
        .expect("entry exists")
        .handlers()
        .iter()
        .map(|h| h.key())
        .collect();
    assert_eq!(keys, vec!["first", "second"]);

    let server = mount(registry, "R");
    server.get("/r/first").await.assert_status_ok();
    server.get("/r/second").await.assert_status_ok();
}

#[tokio::test]
async fn test_express_style_params() {
    let mut registry = registry();
    registry.router("Items").config("/items").get("show", "/:id", show);
    let server = mount(registry, "Items");

    let response = server.get("/items/42").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "id": "42" }));
}

#[tokio::test]
async fn test_same_path_different_methods() {
    let mut registry = registry();
    registry
        .router("Items")
        .config("/items")
        .get("list", "/", foo)
        .post("create", "/", created)
        .requires_login("create", "User");
    let server = mount(registry, "Items");

    server.get("/items").await.assert_status_ok();
    server
        .post("/items")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .post("/items")
        .add_header(AUTHORIZATION, bearer(&token("User")))
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_express_wildcard() {
    let mut registry = registry();
    registry.router("Files").config("/files").get("any", "/*", hello);
    let server = mount(registry, "Files");

    server.get("/files/docs/readme.md").await.assert_status_ok();
}

#[test]
fn test_renamed_parameter_is_a_mount_error() {
    let mut registry = registry();
    registry
        .router("Items")
        .config("/items")
        .get("show", "/:id", show)
        .put("update", "/:itemId", show);

    let result = registry.mount("Items", Router::new());
    assert!(matches!(
        result,
        Err(RouterError::ConflictingRoute { router, path, .. })
            if router == "Items" && path == "/{itemId}"
    ));
}

// ============= Middlewares =============

#[tokio::test]
async fn test_middlewares_run_in_declaration_order() {
    let mut registry = registry();
    registry
        .router("R")
        .config("/r")
        .apply_middlewares("echo", [tag("first"), tag("second")])
        .get("echo", "/echo", echo_order)
        .apply_middlewares("echo", [tag("third")]);
    let server = mount(registry, "R");

    let response = server.get("/r/echo").await;
    response.assert_json(&json!({ "order": "first,second,third" }));
}

#[tokio::test]
async fn test_route_middlewares_skip_undeclared_methods() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let count = Middleware::from_fn("count", move |req: Request, next: Next| {
        counter.fetch_add(1, Ordering::SeqCst);
        next.run(req)
    });

    let mut registry = registry();
    registry
        .router("R")
        .config("/r")
        .get("echo", "/echo", echo_order)
        .apply_middlewares("echo", [count]);
    let server = mount(registry, "R");

    server
        .post("/r/echo")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    server.get("/r/echo").await.assert_status_ok();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_before_and_after() {
    let after = ResponseHook::from_fn(|mut res: Response| async move {
        res.headers_mut()
            .insert("x-after", HeaderValue::from_static("done"));
        res
    });

    let mut registry = registry();
    registry
        .router("R")
        .config("/r")
        .before(tag("before"))
        .after(after)
        .get("echo", "/echo", echo_order)
        .apply_middlewares("echo", [tag("route")]);
    let server = mount(registry, "R");

    let response = server.get("/r/echo").await;
    response.assert_json(&json!({ "order": "before,route" }));
    assert_eq!(response.header("x-after"), "done");
}

#[tokio::test]
async fn test_middleware_can_short_circuit() {
    let gate = Middleware::from_fn("gate", |_req: Request, _next: Next| async move {
        Err::<Response, _>(feyna::AppError::from(
            ApplicationError::with_info("closed", json!({ "status": 503 })),
        ))
    });

    let mut registry = registry();
    registry
        .router("R")
        .config("/r")
        .get("index", "/", hello)
        .apply_middlewares("index", [gate]);
    let server = mount(registry, "R");

    let response = server.get("/r").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    response.assert_json(&json!({ "message": "closed", "data": {} }));
}

#[tokio::test]
async fn test_mount_all_serves_every_router() {
    let mut registry = registry();
    registry.router("A").config("/a").get("index", "/", hello);
    registry.router("B").config("/b/").get("index", "/", foo);

    let app = registry.mount_all(Router::new()).expect("should mount");
    let server = server(app);

    server.get("/a").await.assert_json(&json!({ "message": "Hello World" }));
    server.get("/b").await.assert_json(&json!({ "foo": 1 }));
}
