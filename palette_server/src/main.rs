use anyhow::Context;
use clap::Parser;
use palette_core::{Accounts, Config, JsonFileStore, MessagesClient, TextGenerator};
use palette_server::{AppState, router};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "palette-server", version, about = "Palette Party HTTP API")]
struct Args {
    /// TOML config file (defaults to $PALETTE_CONFIG or ./palette.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address to listen on, overriding the config.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        cfg.bind_addr = bind;
    }
    palette_core::configure_logging(&cfg.log_filter);

    let store = JsonFileStore::open(cfg.palettes_path())?;
    let accounts = Accounts::open(cfg.accounts_path())?
        .with_token_ttl(chrono::Duration::hours(cfg.session_ttl_hours));
    let rater: Option<Arc<dyn TextGenerator>> = match MessagesClient::from_config(&cfg.rating) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!("ratings disabled: {e:#}");
            None
        }
    };

    let app = router(AppState::new(store, accounts, rater));
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("bind {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, data = %cfg.data_dir.display(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("serve http")?;
    Ok(())
}
