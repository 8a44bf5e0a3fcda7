use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway::cache::Identity;
use gateway::proxy::signature;
use gateway::{api, cli, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Loaded before parsing so `sign` can pick its arguments up from .env.
    dotenvy::dotenv().ok();
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Sign { ticket, app_id, nonce, url, timestamp }) => {
            let ts = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
            let params = signature::sign_parameters(&app_id, &ticket, &url, &nonce, ts);
            println!("{}", serde_json::to_string_pretty(&params)?);
            Ok(())
        }
        Some(cli::Commands::Check) => check_credentials(config::load()?).await,
        Some(cli::Commands::Serve { port }) => {
            let cfg = config::load()?;
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        None => {
            let cfg = config::load()?;
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "gateway=debug,tower_http=debug".into()),
    );
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!(
        api_base = %cfg.api_base,
        watched_tables = cfg.watched_tables.len(),
        "initializing gateway"
    );
    let state = Arc::new(AppState::new(cfg)?);
    let app = api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Leadhub gateway listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn check_credentials(cfg: config::Config) -> anyhow::Result<()> {
    let state = AppState::new(cfg)?;
    let mut failed = false;

    for identity in [Identity::Messaging, Identity::Base] {
        let app_id = &state.config.credentials(identity).app_id;
        match state.tenant_token(identity).await {
            Ok(_) => println!("{:<10} {:<24} ok", identity, app_id),
            Err(e) => {
                failed = true;
                println!("{:<10} {:<24} FAILED: {}", identity, app_id, e);
            }
        }
    }

    if failed {
        anyhow::bail!("one or more credential pairs were rejected");
    }
    Ok(())
}
