use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use narrative_job_mock::{config::Config, metrics, njs::NjsClient, server::Server};

/// Mock Narrative Job Service that fabricates child job states for batch apps.
#[derive(Debug, Parser)]
#[command(name = "narrative-job-mock", version)]
struct Args {
    /// Address to listen on, overrides SERVER_ADDR
    #[arg(long)]
    addr: Option<String>,

    /// Narrative Job Service endpoint, overrides NJSW_URL
    #[arg(long)]
    njsw_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    if let Some(url) = args.njsw_url {
        config.njs.url = url;
    }
    config.validate()?;
    info!("Loaded configuration: {:?}", config);

    metrics::register_metrics();

    let client = Arc::new(NjsClient::new(&config.njs)?);
    info!("Proxying job states from {}", client.url());

    let server = Server::new(&config, client);

    info!("Starting server on {}", config.server.addr);
    server.start(&config.server.addr).await?;

    Ok(())
}
