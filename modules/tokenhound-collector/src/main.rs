use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use tokenhound_collector::{ChromeLauncher, CollectionLoop, CollectionOrchestrator, PageFetcher};
use tokenhound_common::{telemetry, CollectorConfig, SystemClock};
use tor_control::TorControlClient;

#[derive(Parser)]
#[command(name = "collector", about = "Collect listing snapshots through a rotating proxy")]
struct Cli {
    /// Run a single tick (with its retries) and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing()?;
    let cli = Cli::parse();

    info!("Tokenhound collector starting...");
    let config = CollectorConfig::from_env();

    let rotator = Arc::new(
        TorControlClient::new(&config.tor_control_addr, &config.tor_control_password)
            .with_deadline(config.tor_control_deadline),
    );
    let launcher = Arc::new(ChromeLauncher::new(
        config.chrome_bin.clone(),
        config.proxy_url.clone(),
        config.sweep_process_names.clone(),
    ));
    let fetcher = Arc::new(PageFetcher::new(launcher, &config));
    let orchestrator = Arc::new(CollectionOrchestrator::new(
        fetcher,
        rotator.clone(),
        Arc::new(SystemClock),
        config,
    ));
    let collection = Arc::new(CollectionLoop::new(orchestrator, rotator));

    collection.check_health().await;

    let outcome = collection.run_with_retry().await;
    info!(?outcome, "Initial collection done");
    if cli.once {
        return Ok(());
    }

    collection.start();
    tokio::signal::ctrl_c().await?;
    info!("Shutting down collector");
    collection.shutdown().await;
    Ok(())
}
