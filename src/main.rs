//! feyna demo server
//!
//! Mounts a couple of example routers and serves them:
//! - `feyna-server` / `feyna-server serve` - Run the server
//! - `feyna-server token --role Admin` - Print a signed token for manual testing

use axum::{extract::Path, Json, Router};
use clap::{Parser, Subcommand};
use feyna::{
    ApplicationError, AuthUser, FeynaConfig, Identity, Reply, Result, RouterRegistry,
    TokenVerifier,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "feyna-server")]
#[command(author, version, about = "Demo server for feyna declarative routers")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "feyna.toml")]
    config: PathBuf,

    /// Host to bind (overrides config)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Print a token signed with the configured secret
    Token {
        /// Role stored under the token's `data.role` claim
        #[arg(short, long, default_value = "User")]
        role: String,

        /// Token lifetime in minutes; omit for a token without expiry
        #[arg(long)]
        ttl_minutes: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        FeynaConfig::load(&cli.config)?
    } else {
        FeynaConfig::default()
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !cli.config.exists() {
        tracing::warn!(path = ?cli.config, "Config file not found, using defaults");
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let host = cli.host.unwrap_or_else(|| config.server.host.clone());
            let port = cli.port.unwrap_or(config.server.port);
            serve(&config, &host, port).await
        }
        Commands::Token { role, ttl_minutes } => {
            let verifier = TokenVerifier::new(config.jwt_secret()?);
            let token = verifier.issue(
                Identity::with_role(role),
                ttl_minutes.map(chrono::Duration::minutes),
            )?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(config: &FeynaConfig, host: &str, port: u16) -> anyhow::Result<()> {
    let mut registry: RouterRegistry = RouterRegistry::from_config(config)?;

    registry
        .router("HealthRouter")
        .config("/health")
        .get("status", "/", health)
        .requires_login("status", false);

    registry
        .router("TestRouter")
        .config("/test")
        .get("index", "/", index)
        .get("me", "/me", me)
        .requires_login("me", "User")
        .get("item", "/items/:id", item)
        .post("create", "/items", create)
        .requires_login("create", "User")
        .delete("remove", "/items/:id", remove)
        .requires_login("remove", "Admin");

    let app = registry
        .mount_all(Router::new())?
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "feyna demo server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Reply {
    Reply::new(json!({ "status": 200, "ok": true }))
}

async fn index() -> Result<Reply> {
    Ok(Reply::new(json!({ "message": "Hello World" })))
}

async fn me(AuthUser(claims): AuthUser) -> Result<Reply> {
    Reply::json(&claims.data)
}

async fn item(Path(id): Path<u64>, user: Option<AuthUser>) -> Result<Reply> {
    if id != 1 {
        return Err(ApplicationError::with_info(
            "Item not found.",
            json!({ "status": 404, "id": id }),
        )
        .into());
    }

    Ok(Reply::new(json!({
        "id": id,
        "name": "First item",
        "viewer": user.and_then(|AuthUser(claims)| claims.data.role),
    })))
}

async fn create(Json(payload): Json<Value>) -> Result<Reply> {
    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApplicationError::with_info("Name is required.", json!({ "field": "name" })))?;

    Ok(Reply::new(json!({ "id": 2, "name": name, "status": 201 })))
}

async fn remove(Path(id): Path<u64>) -> Result<Reply> {
    Ok(Reply::new(json!({ "deleted": id })))
}
