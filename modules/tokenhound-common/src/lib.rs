pub mod clock;
pub mod config;
pub mod error;
pub mod parse;
pub mod schedule;
pub mod store;
pub mod telemetry;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ApiConfig, CollectorConfig, EnricherConfig};
pub use error::TokenhoundError;
pub use schedule::RecurringTask;
pub use store::{write_json_atomic, ResultStore, Upsert};
pub use types::*;
