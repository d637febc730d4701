use clap::Parser;
use tracing_subscriber::EnvFilter;

use sentinel_server::cli::{self, Cli};
use sentinel_server::error::ServerError;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    sentinel_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli::run(cli).await {
        tracing::error!(error = %e, "sentinel exited with error");
        return Err(e);
    }

    Ok(())
}
