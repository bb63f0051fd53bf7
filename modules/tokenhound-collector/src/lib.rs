pub mod browser;
pub mod extract;
pub mod fetcher;
pub mod identity;
pub mod orchestrator;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use browser::{BrowserLauncher, BrowserSession, ChromeLauncher, WaitUntil};
pub use fetcher::{PageFetcher, PageSource};
pub use identity::IdentityRotator;
pub use orchestrator::{CollectionOrchestrator, CollectionState, CycleOutcome};
pub use scheduler::{CollectionLoop, TickOutcome};
