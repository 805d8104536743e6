//! Warble Relay Server
//!
//! HTTP server that relays streaming chat completions to the browser with
//! the reply budget enforced, and persists personas and avatars.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use warble_core::sse::ReplyBudget;
use warble_core::tracing_init::init_tracing;
use warble_relay::routes::{AppState, build_router};
use warble_relay::storage::PersonaStore;
use warble_relay::uploads::AvatarStore;
use warble_relay::upstream::{UpstreamClient, UpstreamConfig};

#[derive(Parser, Debug)]
#[command(name = "warble-relay")]
#[command(
    version,
    about = "Warble relay server - budget-enforcing companion chat over SSE"
)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: SocketAddr,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Directory for uploaded avatars.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible upstream API.
    #[arg(
        long,
        default_value = "https://api.openai.com/v1",
        env = "WARBLE_UPSTREAM_URL"
    )]
    upstream_url: String,

    /// Upstream API key.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Model requested from the upstream.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Reply ceiling in Unicode code points.
    #[arg(long, default_value_t = ReplyBudget::DEFAULT_LIMIT)]
    reply_limit: usize,

    /// Secret for signing upload grants.
    #[arg(
        long,
        env = "WARBLE_UPLOAD_SECRET",
        default_value = "dev-secret-change-me",
        hide_env_values = true
    )]
    upload_secret: String,

    /// Upload grant TTL in seconds.
    #[arg(long, default_value_t = 600)]
    upload_ttl: i64,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("warble_relay=info", args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        "Starting warble-relay"
    );

    let db_path = match &args.db_path {
        Some(path) => path.clone(),
        None => default_home_path("warble.db")?,
    };
    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => default_home_path("avatars")?,
    };

    let db = PersonaStore::open(&db_path).await?;
    let upstream = Arc::new(UpstreamClient::new(UpstreamConfig {
        base_url: args.upstream_url,
        api_key: args.api_key,
        model: args.model,
    }));
    let avatars = Arc::new(AvatarStore::new(
        data_dir,
        args.upload_secret.as_bytes(),
        args.upload_ttl,
    ));

    let app = build_router(AppState {
        db,
        upstream,
        avatars,
        reply_limit: args.reply_limit,
    });

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, "Relay server listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Relay stopped");
    Ok(())
}

fn default_home_path(leaf: &str) -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".warble").join(leaf))
}
