use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

const DEFAULT_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.2227.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.3497.92 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36",
];

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Deadlines for one page fetch.
#[derive(Debug, Clone)]
pub struct FetchTimings {
    /// Primary navigation, waiting for the network to go idle.
    pub network_idle_deadline: Duration,
    /// Fallback navigation, waiting only for the DOM.
    pub dom_loaded_deadline: Duration,
    /// Time given to client-side rendering and challenge screens.
    pub settle: Duration,
    /// Bounded wait for the listing table to appear.
    pub content_wait: Duration,
}

impl Default for FetchTimings {
    fn default() -> Self {
        Self {
            network_idle_deadline: Duration::from_secs(30),
            dom_loaded_deadline: Duration::from_secs(45),
            settle: Duration::from_secs(8),
            content_wait: Duration::from_secs(15),
        }
    }
}

/// Per-page retry with exponential backoff: `base * 2^attempt`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the given 1-based failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Backoff applied by the scheduling loop between collection attempts.
#[derive(Debug, Clone)]
pub struct SchedulerBackoff {
    /// Attempts per scheduled tick before giving up until the next tick.
    pub max_attempts_per_tick: u32,
    pub base_delay: Duration,
    /// From this many consecutive failures on, switch to minute cooldowns.
    pub cooldown_threshold: u32,
    pub cooldown_step: Duration,
    pub max_cooldown: Duration,
    /// This many consecutive failures forces `long_pause` and a reset.
    pub hard_ceiling: u32,
    pub long_pause: Duration,
}

impl SchedulerBackoff {
    /// Wait before the next attempt given the consecutive failure count.
    pub fn wait_for(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures >= self.cooldown_threshold {
            let steps = consecutive_failures - self.cooldown_threshold + 1;
            self.cooldown_step.saturating_mul(steps).min(self.max_cooldown)
        } else {
            self.base_delay
                .saturating_mul(2u32.saturating_pow(consecutive_failures))
        }
    }
}

impl Default for SchedulerBackoff {
    fn default() -> Self {
        Self {
            max_attempts_per_tick: 5,
            base_delay: Duration::from_secs(1),
            cooldown_threshold: 6,
            cooldown_step: Duration::from_secs(60),
            max_cooldown: Duration::from_secs(5 * 60),
            hard_ceiling: 10,
            long_pause: Duration::from_secs(10 * 60),
        }
    }
}

/// Collection engine configuration.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Listing page URL with a `{page}` placeholder.
    pub listing_url_template: String,
    /// Origin prepended to relative row links.
    pub site_origin: String,
    pub first_page: u32,
    pub last_page: u32,
    pub snapshot_path: PathBuf,

    // Browser
    pub chrome_bin: String,
    pub proxy_url: String,
    pub user_agents: Vec<String>,
    /// Process names swept after every session.
    pub sweep_process_names: Vec<String>,

    // Identity rotation
    pub tor_control_addr: String,
    pub tor_control_password: String,
    pub tor_control_deadline: Duration,

    // Pacing
    pub fetch: FetchTimings,
    pub retry: RetryPolicy,
    pub inter_page_delay: Duration,
    pub degradation_window: Duration,
    pub extended_cooldown: Duration,
    pub period: Duration,
    pub backoff: SchedulerBackoff,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            listing_url_template: "https://dexscreener.com/aptos/page-{page}?order=asc&rankBy=pairAge"
                .to_string(),
            site_origin: "https://dexscreener.com".to_string(),
            first_page: 1,
            last_page: 7,
            snapshot_path: PathBuf::from("aptos_tokens.json"),
            chrome_bin: "chromium".to_string(),
            proxy_url: "socks5://127.0.0.1:9050".to_string(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            sweep_process_names: vec!["chromium".to_string(), "chrome".to_string()],
            tor_control_addr: "127.0.0.1:9051".to_string(),
            tor_control_password: String::new(),
            tor_control_deadline: Duration::from_secs(5),
            fetch: FetchTimings::default(),
            retry: RetryPolicy::default(),
            inter_page_delay: Duration::from_secs(2),
            degradation_window: Duration::from_secs(30 * 60),
            extended_cooldown: Duration::from_secs(10 * 60),
            period: Duration::from_secs(5 * 60),
            backoff: SchedulerBackoff::default(),
        }
    }
}

impl CollectorConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            listing_url_template: env_or("LISTING_URL_TEMPLATE", defaults.listing_url_template),
            site_origin: env_or("LISTING_SITE_ORIGIN", defaults.site_origin),
            first_page: env_parse("LISTING_FIRST_PAGE", defaults.first_page),
            last_page: env_parse("LISTING_LAST_PAGE", defaults.last_page),
            snapshot_path: env_or("SNAPSHOT_PATH", defaults.snapshot_path),
            chrome_bin: env_or("CHROME_BIN", defaults.chrome_bin),
            proxy_url: env_or("SOCKS_PROXY_URL", defaults.proxy_url),
            user_agents: env_list("USER_AGENTS").unwrap_or(defaults.user_agents),
            sweep_process_names: env_list("SWEEP_PROCESS_NAMES")
                .unwrap_or(defaults.sweep_process_names),
            tor_control_addr: env_or("TOR_CONTROL_ADDR", defaults.tor_control_addr),
            tor_control_password: env_or("TOR_CONTROL_PASSWORD", defaults.tor_control_password),
            tor_control_deadline: env_secs("TOR_CONTROL_TIMEOUT_SECS", defaults.tor_control_deadline),
            fetch: defaults.fetch,
            retry: RetryPolicy {
                max_attempts: env_parse("PAGE_MAX_ATTEMPTS", defaults.retry.max_attempts),
                ..defaults.retry
            },
            inter_page_delay: env_secs("INTER_PAGE_DELAY_SECS", defaults.inter_page_delay),
            degradation_window: env_secs("DEGRADATION_WINDOW_SECS", defaults.degradation_window),
            extended_cooldown: env_secs("EXTENDED_COOLDOWN_SECS", defaults.extended_cooldown),
            period: env_secs("COLLECT_INTERVAL_SECS", defaults.period),
            backoff: defaults.backoff,
        };

        config.log_keys();
        config
    }

    /// URL for a 1-based listing page.
    pub fn page_url(&self, page: u32) -> String {
        self.listing_url_template.replace("{page}", &page.to_string())
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.first_page..=self.last_page
    }

    fn log_keys(&self) {
        info!("Collector config loaded:");
        info!("  LISTING_URL_TEMPLATE: {}", self.listing_url_template);
        info!("  pages: {}..={}", self.first_page, self.last_page);
        info!("  SNAPSHOT_PATH: {}", self.snapshot_path.display());
        info!("  SOCKS_PROXY_URL: {}", self.proxy_url);
        info!("  TOR_CONTROL_ADDR: {}", self.tor_control_addr);
        info!("  TOR_CONTROL_PASSWORD: {}", preview(&self.tor_control_password));
        if self.tor_control_password.is_empty() {
            warn!("TOR_CONTROL_PASSWORD is empty; identity rotation will likely be rejected");
        }
    }
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Enrichment pipeline configuration.
#[derive(Debug, Clone)]
pub struct EnricherConfig {
    pub social_feed_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub store_path: PathBuf,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Fixed pause between classification calls.
    pub inter_call_delay: Duration,
    /// Period of the full re-evaluation pass.
    pub full_pass_period: Duration,
    pub max_posts: usize,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            social_feed_path: PathBuf::from("tweets.json"),
            snapshot_path: PathBuf::from("aptos_tokens.json"),
            store_path: PathBuf::from("ai_analyzer.json"),
            model: "gemini-2.0-flash-exp".to_string(),
            max_output_tokens: 1000,
            temperature: 0.7,
            top_p: 0.95,
            inter_call_delay: Duration::from_secs(30),
            full_pass_period: Duration::from_secs(24 * 60 * 60),
            max_posts: 20,
        }
    }
}

impl EnricherConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            social_feed_path: env_or("SOCIAL_FEED_PATH", defaults.social_feed_path),
            snapshot_path: env_or("SNAPSHOT_PATH", defaults.snapshot_path),
            store_path: env_or("RESULT_STORE_PATH", defaults.store_path),
            model: env_or("GEMINI_MODEL", defaults.model),
            max_output_tokens: env_parse("GEMINI_MAX_OUTPUT_TOKENS", defaults.max_output_tokens),
            temperature: env_parse("GEMINI_TEMPERATURE", defaults.temperature),
            top_p: env_parse("GEMINI_TOP_P", defaults.top_p),
            inter_call_delay: env_secs("INTER_CALL_DELAY_SECS", defaults.inter_call_delay),
            full_pass_period: env_secs("FULL_PASS_INTERVAL_SECS", defaults.full_pass_period),
            max_posts: env_parse("MAX_POSTS_PER_SYMBOL", defaults.max_posts),
        };

        info!("Enricher config loaded:");
        info!("  SOCIAL_FEED_PATH: {}", config.social_feed_path.display());
        info!("  SNAPSHOT_PATH: {}", config.snapshot_path.display());
        info!("  RESULT_STORE_PATH: {}", config.store_path.display());
        info!("  GEMINI_MODEL: {}", config.model);
        config
    }
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub store_path: PathBuf,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            host: env_or("API_HOST", "0.0.0.0".to_string()),
            port: env_parse("API_PORT", 3001),
            store_path: env_or("RESULT_STORE_PATH", PathBuf::from("ai_analyzer.json")),
        }
    }
}

// ---------------------------------------------------------------------------
// Env helpers
// ---------------------------------------------------------------------------

fn env_or<T: From<String>>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) if !v.is_empty() => T::from(v),
        _ => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = v.as_str(), "Unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(key, default.as_secs()))
}

/// `|`-separated list; user agents contain commas.
fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = env::var(key).ok()?;
    let items: Vec<String> = raw
        .split('|')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!items.is_empty()).then_some(items)
}

fn preview(val: &str) -> String {
    if val.is_empty() {
        return "<not set>".to_string();
    }
    let n = val.chars().count().min(2);
    let head: String = val.chars().take(n).collect();
    format!("{head}...({} chars)", val.chars().count())
}
