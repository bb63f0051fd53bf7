use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use tokenhound_common::RecurringTask;

use crate::orchestrator::{EnrichmentOrchestrator, RunSummary};

/// Unseen symbols at startup, then a full re-evaluation every period.
pub struct EnrichmentLoop {
    orchestrator: Arc<Mutex<EnrichmentOrchestrator>>,
    task: RecurringTask,
}

impl EnrichmentLoop {
    pub fn new(orchestrator: EnrichmentOrchestrator) -> Self {
        let period = orchestrator.config().full_pass_period;
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            task: RecurringTask::new("enricher", period),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Mutex<EnrichmentOrchestrator>> {
        &self.orchestrator
    }

    pub async fn run_initial(&self) -> Result<RunSummary> {
        self.orchestrator.lock().await.initial_pass().await
    }

    pub async fn run_full(&self) -> Result<RunSummary> {
        self.orchestrator.lock().await.full_pass().await
    }

    /// Schedule the periodic full pass. The first one is a period away.
    pub fn start_daily(&self) -> bool {
        let orchestrator = self.orchestrator.clone();
        self.task.start(move || {
            let orchestrator = orchestrator.clone();
            async move {
                match orchestrator.lock().await.full_pass().await {
                    Ok(summary) if summary.halted() => {
                        warn!(?summary, "Scheduled full pass stopped early")
                    }
                    Ok(summary) => info!(?summary, "Scheduled full pass done"),
                    Err(e) => error!(error = %e, "Scheduled full pass failed"),
                }
            }
        })
    }

    pub fn is_scheduled(&self) -> bool {
        self.task.is_running()
    }

    pub async fn shutdown(&self) {
        self.task.shutdown().await;
    }
}
