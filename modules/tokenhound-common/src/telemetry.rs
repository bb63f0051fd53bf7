use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Log output settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `RUST_LOG`, if set.
    pub filter: Option<String>,
    /// `TOKENHOUND_LOG_JSON=1` for one JSON object per line.
    pub json: bool,
}

impl LogSettings {
    /// Loads `.env` before reading, so values set there apply to logging too.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            filter: std::env::var("RUST_LOG").ok().filter(|v| !v.is_empty()),
            json: std::env::var("TOKENHOUND_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

/// Install the global subscriber for a binary.
///
/// `RUST_LOG` is honored on top of `tokenhound=info`.
pub fn init_tracing() -> Result<()> {
    let settings = LogSettings::from_env();

    let filter = settings
        .filter
        .as_deref()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(""))
        .add_directive("tokenhound=info".parse()?)
        .add_directive("tor_control=info".parse()?)
        .add_directive("cdp_client=info".parse()?)
        .add_directive("ai_client=info".parse()?);

    if settings.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
