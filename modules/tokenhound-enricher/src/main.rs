use std::sync::Arc;

use ai_client::{Gemini, GenerationConfig};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tokenhound_common::{telemetry, EnricherConfig};
use tokenhound_enricher::{Classifier, EnrichmentLoop, EnrichmentOrchestrator};

#[derive(Parser)]
#[command(name = "enricher", about = "Score newly listed tokens with Gemini")]
struct Cli {
    /// Run the startup pass and exit.
    #[arg(long)]
    once: bool,

    /// Re-score every symbol instead of only unseen ones.
    #[arg(long)]
    full: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing()?;
    let cli = Cli::parse();

    info!("Tokenhound enricher starting...");
    let config = EnricherConfig::from_env();

    let model = Gemini::from_env(config.model.clone())
        .context("configuring Gemini")?
        .with_generation(GenerationConfig {
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        });
    let classifier = Classifier::new(Arc::new(model), config.max_posts);
    let orchestrator = EnrichmentOrchestrator::open(classifier, config)?;
    let enrichment = EnrichmentLoop::new(orchestrator);

    let summary = if cli.full {
        enrichment.run_full().await?
    } else {
        enrichment.run_initial().await?
    };
    info!(?summary, "Startup pass done");
    if cli.once {
        return Ok(());
    }

    enrichment.start_daily();
    tokio::signal::ctrl_c().await?;
    info!("Shutting down enricher");
    enrichment.shutdown().await;
    Ok(())
}
