// Test mocks for the collection engine.
//
// One mock per trait boundary:
// - MockLauncher / MockSession (BrowserLauncher / BrowserSession) serve canned HTML
// - MockPageSource (PageSource) returns scripted rows or timeouts per page
// - MockRotator (IdentityRotator) counts rotations
//
// Plus HTML and row fixtures shaped like the live listing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tor_control::TorControlError;

use tokenhound_common::{ListingRow, TokenhoundError};

use crate::browser::{BrowserLauncher, BrowserSession, WaitUntil};
use crate::fetcher::PageSource;
use crate::identity::IdentityRotator;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// One rendered listing row in the markup the live table uses.
pub fn listing_row_html(name: &str, symbol: &str, href: &str) -> String {
    format!(
        r#"<a class="ds-dex-table-row ds-dex-table-row-new" href="{href}">
            <span class="ds-dex-table-row-base-token-name">{name}</span>
            <span class="ds-dex-table-row-base-token-symbol">{symbol}</span>
            <span class="ds-dex-table-row-quote-token-symbol">APT</span>
            <div class="ds-dex-table-row-col-price">$0.0<sub>4</sub> 1234</div>
            <div class="ds-dex-table-row-col-volume">$12K</div>
            <div class="ds-dex-table-row-col-market-cap">$1.2M</div>
            <div class="ds-dex-table-row-col-liquidity">$80K</div>
            <div class="ds-dex-table-row-col-txns">1,024</div>
            <div class="ds-dex-table-row-col-pair-age">3h</div>
            <div class="ds-dex-table-row-col-price-change-m5">1.2%</div>
            <div class="ds-dex-table-row-col-price-change-h1">-4.5%</div>
            <div class="ds-dex-table-row-col-price-change-h6">12%</div>
            <div class="ds-dex-table-row-col-price-change-h24">1,234%</div>
        </a>"#
    )
}

pub fn listing_page_html(rows: &[String]) -> String {
    format!(
        "<html><body><div class=\"ds-dex-table\">{}</div></body></html>",
        rows.join("\n")
    )
}

/// A plausible extracted row for `symbol`.
pub fn listing_row(symbol: &str) -> ListingRow {
    ListingRow {
        name: format!("{symbol} Token"),
        symbol: symbol.to_string(),
        symbol1: "APT".to_string(),
        price: "$0.0012".to_string(),
        volume: "$12K".to_string(),
        liquidity: "$80K".to_string(),
        mcap: "$1.2M".to_string(),
        transactions: "1,024".to_string(),
        age: "3h".to_string(),
        change_5m: "1.2%".to_string(),
        change_1h: "-4.5%".to_string(),
        change_6h: "12%".to_string(),
        change_24h: "30%".to_string(),
        href: Some(format!("https://dexscreener.com/aptos/{}", symbol.to_lowercase())),
    }
}

// ---------------------------------------------------------------------------
// MockLauncher
// ---------------------------------------------------------------------------

/// What each launched session serves and where it fails.
#[derive(Debug, Clone, Default)]
pub struct SessionScript {
    pub html: String,
    pub fail_network_idle: bool,
    pub fail_dom_loaded: bool,
}

impl SessionScript {
    pub fn serving(html: String) -> Self {
        Self {
            html,
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct LauncherLog {
    user_agents: Vec<String>,
    navigations: Vec<(String, WaitUntil)>,
    closed: usize,
    sweeps: usize,
}

/// Launcher whose sessions serve one canned page. `failing()` refuses to launch.
pub struct MockLauncher {
    script: Option<SessionScript>,
    log: Arc<Mutex<LauncherLog>>,
}

impl MockLauncher {
    pub fn new(script: SessionScript) -> Self {
        Self {
            script: Some(script),
            log: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: None,
            log: Arc::default(),
        }
    }

    pub fn launched_with(&self) -> Vec<String> {
        self.log.lock().unwrap().user_agents.clone()
    }

    pub fn navigations(&self) -> Vec<(String, WaitUntil)> {
        self.log.lock().unwrap().navigations.clone()
    }

    pub fn closed_sessions(&self) -> usize {
        self.log.lock().unwrap().closed
    }

    pub fn sweeps(&self) -> usize {
        self.log.lock().unwrap().sweeps
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>, TokenhoundError> {
        self.log.lock().unwrap().user_agents.push(user_agent.to_string());
        match &self.script {
            Some(script) => Ok(Box::new(MockSession {
                script: script.clone(),
                log: self.log.clone(),
            })),
            None => Err(TokenhoundError::Browser("launch refused".to_string())),
        }
    }

    async fn sweep(&self) {
        self.log.lock().unwrap().sweeps += 1;
    }
}

pub struct MockSession {
    script: SessionScript,
    log: Arc<Mutex<LauncherLog>>,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitUntil,
        deadline: Duration,
    ) -> Result<(), TokenhoundError> {
        self.log.lock().unwrap().navigations.push((url.to_string(), wait));
        let fails = match wait {
            WaitUntil::NetworkIdle => self.script.fail_network_idle,
            WaitUntil::DomContentLoaded => self.script.fail_dom_loaded,
        };
        if fails {
            return Err(TokenhoundError::Timeout(deadline));
        }
        Ok(())
    }

    async fn body_text(&mut self) -> Result<String, TokenhoundError> {
        Ok(self.script.html.clone())
    }

    async fn html(&mut self) -> Result<String, TokenhoundError> {
        Ok(self.script.html.clone())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        deadline: Duration,
    ) -> Result<(), TokenhoundError> {
        let class = selector.trim_start_matches('.');
        if self.script.html.contains(class) {
            Ok(())
        } else {
            Err(TokenhoundError::Timeout(deadline))
        }
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed += 1;
    }
}

// ---------------------------------------------------------------------------
// MockPageSource
// ---------------------------------------------------------------------------

/// Scripted page source. Unregistered pages come back empty.
/// Builder pattern: `.on_page()`, `.failing_first()`, `.timing_out()`, `.with_delay()`.
#[derive(Default)]
pub struct MockPageSource {
    pages: HashMap<u32, Vec<ListingRow>>,
    failures_left: Mutex<HashMap<u32, u32>>,
    timeouts: HashSet<u32>,
    calls: Mutex<Vec<(u32, String)>>,
    delay: Duration,
}

impl MockPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, page: u32, rows: Vec<ListingRow>) -> Self {
        self.pages.insert(page, rows);
        self
    }

    /// Return nothing for the first `times` requests of `page`.
    pub fn failing_first(self, page: u32, times: u32) -> Self {
        self.failures_left.lock().unwrap().insert(page, times);
        self
    }

    /// Every request of `page` fails with a navigation timeout.
    pub fn timing_out(mut self, page: u32) -> Self {
        self.timeouts.insert(page);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(u32, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, page: u32) -> usize {
        self.calls.lock().unwrap().iter().filter(|(p, _)| *p == page).count()
    }
}

#[async_trait]
impl PageSource for MockPageSource {
    async fn fetch_page(&self, page: u32, user_agent: &str) -> Result<Vec<ListingRow>, TokenhoundError> {
        self.calls.lock().unwrap().push((page, user_agent.to_string()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.timeouts.contains(&page) {
            return Err(TokenhoundError::Timeout(Duration::from_secs(30)));
        }
        {
            let mut failures = self.failures_left.lock().unwrap();
            if let Some(left) = failures.get_mut(&page) {
                if *left > 0 {
                    *left -= 1;
                    return Ok(Vec::new());
                }
            }
        }
        Ok(self.pages.get(&page).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockRotator
// ---------------------------------------------------------------------------

pub struct MockRotator {
    rotations: AtomicUsize,
    reachable: bool,
    fail: bool,
}

impl MockRotator {
    pub fn new() -> Self {
        Self {
            rotations: AtomicUsize::new(0),
            reachable: true,
            fail: false,
        }
    }

    /// Every rotation is rejected and the endpoint reports unreachable.
    pub fn broken() -> Self {
        Self {
            rotations: AtomicUsize::new(0),
            reachable: false,
            fail: true,
        }
    }

    pub fn rotations(&self) -> usize {
        self.rotations.load(Ordering::SeqCst)
    }
}

impl Default for MockRotator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityRotator for MockRotator {
    async fn rotate(&self) -> Result<(), TorControlError> {
        self.rotations.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(TorControlError::AuthRejected)
        } else {
            Ok(())
        }
    }

    async fn is_reachable(&self) -> bool {
        self.reachable
    }
}
