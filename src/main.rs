use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;

use mustang::app::AppContext;
use mustang::config::Config;
use mustang::logging;
use mustang::server::Server;

// NOTE: There is no graceful shutdown. A serve loop that exits is logged
// and the remaining loops keep serving.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init(config.log_format).context("failed to initialize logging")?;

    let addr = config.listen_addr();
    tracing::info!(%addr, database = %config.database_path.display(), "starting mustang");

    let app = AppContext::open(config).inspect_err(|e| {
        tracing::error!(error = %e, "failed to open database");
    })?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    Server::new(listener, app).serve().await;
    Ok(())
}
