pub mod classifier;
pub mod market;
pub mod orchestrator;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use classifier::{parse_verdict, Classifier, ClassifyFailure, Halt, Scores, Verdict};
pub use market::{market_fields, refresh_market_fields, rejoin, SnapshotWatcher};
pub use orchestrator::{EnrichmentOrchestrator, RunSummary};
pub use scheduler::EnrichmentLoop;
