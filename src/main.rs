//! sandchat server binary.
//!
//! Runs the chat API (default) or seeds the demo accounts.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sandchat::agent_core::{ConversationStore, ReplyEngine};
use sandchat::config::{load_config, AppConfig};
use sandchat::inference::InferenceClient;
use sandchat::sandbox::SandboxStore;
use sandchat::server::{self, auth::hash_password, AppState};

/// Demo accounts created by `seed-users`.
const DEMO_USERS: [(&str, &str); 3] = [
    ("admin", "admin12345"),
    ("user1", "user12345"),
    ("user2", "user12345"),
];

/// sandchat - multi-user chat with a per-user file sandbox
#[derive(Parser, Debug)]
#[command(name = "sandchat", version)]
#[command(about = "Chat server whose assistant can list, read and write files in a private sandbox")]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create or reset the demo users
    SeedUsers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("loading configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::SeedUsers => seed_users(&config),
    }
}

fn open_store(config: &AppConfig) -> anyhow::Result<ConversationStore> {
    let db_path = config.storage.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = ConversationStore::open(&db_path.to_string_lossy())
        .with_context(|| format!("opening database {}", db_path.display()))?;
    Ok(store)
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let data_dir = config.storage.data_dir();
    sandchat::init_tracing(&data_dir).context("initializing logging")?;

    let store = Arc::new(open_store(&config)?);
    let sandbox = Arc::new(SandboxStore::new(config.storage.sandbox_root()));
    tracing::info!(
        data_dir = %data_dir.display(),
        database = %config.storage.database_path().display(),
        sandbox_root = %sandbox.base().display(),
        "storage ready"
    );

    let client = InferenceClient::new(config.model.clone()).context("building model client")?;
    if !client.health_check().await {
        tracing::warn!(
            base_url = %client.base_url(),
            "model endpoint not reachable yet; chat replies will fail until it is"
        );
    }
    tracing::info!(model = %client.model_name(), base_url = %client.base_url(), "model client ready");

    let engine = Arc::new(ReplyEngine::new(
        client,
        Arc::clone(&store),
        Arc::clone(&sandbox),
        config.agent,
    ));
    let app = server::router(AppState {
        store,
        sandbox,
        engine,
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn seed_users(config: &AppConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    for (username, password) in DEMO_USERS {
        let created = store.upsert_user(username, &hash_password(password))?;
        println!("{}: {username}", if created { "CREATED" } else { "UPDATED" });
    }
    println!("Done.");
    Ok(())
}
