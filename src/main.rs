use anyhow::Result;
use clap::Parser;
use sheets_i18n::config::{CliArgs, ServerConfig};
use sheets_i18n::server;
use sheets_i18n::state::AppState;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(ServerConfig::from_args(CliArgs::parse())?);
    tracing::info!(?config, "starting sheets-i18n");
    if config.service_account_token.is_none() {
        tracing::warn!("no service account token configured; requests without a user token will be denied by the Sheets API");
    }

    let state = Arc::new(AppState::new(config)?);
    server::serve(state).await
}
