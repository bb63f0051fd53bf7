use std::time::Duration;

use async_trait::async_trait;
use cdp_client::{Browser, CdpError, LaunchOptions, Page};
use tracing::{debug, info, warn};

use tokenhound_common::TokenhoundError;

pub use cdp_client::WaitUntil;

// --- Browser traits ---

/// One isolated browser session: a process, a context and a page.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for `wait`, failing after `deadline`.
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitUntil,
        deadline: Duration,
    ) -> Result<(), TokenhoundError>;

    /// Rendered text of the page body.
    async fn body_text(&mut self) -> Result<String, TokenhoundError>;

    /// Serialized DOM.
    async fn html(&mut self) -> Result<String, TokenhoundError>;

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        deadline: Duration,
    ) -> Result<(), TokenhoundError>;

    /// Release page, context and browser, in that order. Each step is
    /// attempted even if an earlier one failed; failures are only logged.
    async fn close(&mut self);
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>, TokenhoundError>;

    /// Kill leftover browser processes by name. Best effort.
    async fn sweep(&self);
}

// --- Chrome over DevTools ---

/// Switches that keep a headless browser lean inside a container.
const HARDENING_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--disable-gpu",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-component-extensions-with-background-pages",
    "--disable-features=site-per-process,TranslateUI",
    "--disable-ipc-flooding-protection",
    "--disable-renderer-backgrounding",
    "--ignore-certificate-errors",
];

const VIEWPORT: (u32, u32) = (1280, 720);

/// Launches a fresh Chrome per session, routed through a SOCKS proxy.
pub struct ChromeLauncher {
    chrome_bin: String,
    proxy_url: String,
    sweep_process_names: Vec<String>,
}

impl ChromeLauncher {
    pub fn new(
        chrome_bin: impl Into<String>,
        proxy_url: impl Into<String>,
        sweep_process_names: Vec<String>,
    ) -> Self {
        let launcher = Self {
            chrome_bin: chrome_bin.into(),
            proxy_url: proxy_url.into(),
            sweep_process_names,
        };
        info!(
            chrome_bin = launcher.chrome_bin.as_str(),
            proxy = launcher.proxy_url.as_str(),
            "Using ChromeLauncher"
        );
        launcher
    }

    fn options(&self, user_agent: &str) -> LaunchOptions {
        let mut options = LaunchOptions::new(&self.chrome_bin)
            .arg(format!("--window-size={},{}", VIEWPORT.0, VIEWPORT.1));
        options.args.extend(HARDENING_ARGS.iter().map(|a| a.to_string()));
        if !self.proxy_url.is_empty() {
            options.args.push(format!("--proxy-server={}", self.proxy_url));
        }
        if !user_agent.is_empty() {
            options.args.push(format!("--user-agent={user_agent}"));
        }
        options
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>, TokenhoundError> {
        let mut browser = Browser::launch(&self.options(user_agent))
            .await
            .map_err(browser_error)?;

        match open_page(&browser, user_agent).await {
            Ok((context_id, page)) => Ok(Box::new(ChromeSession {
                browser,
                context_id: Some(context_id),
                page: Some(page),
            })),
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!(error = %close_err, "Error closing browser after failed setup");
                }
                Err(browser_error(e))
            }
        }
    }

    async fn sweep(&self) {
        for name in &self.sweep_process_names {
            match tokio::process::Command::new("pkill")
                .args(["-9", name.as_str()])
                .output()
                .await
            {
                // pkill exits 1 when nothing matched.
                Ok(output) => debug!(process = name.as_str(), status = %output.status, "Process sweep"),
                Err(e) => debug!(process = name.as_str(), error = %e, "Process sweep unavailable"),
            }
        }
    }
}

async fn open_page(browser: &Browser, user_agent: &str) -> Result<(String, Page), CdpError> {
    let context_id = browser.new_context().await?;
    let page = browser.new_page(&context_id).await?;
    if !user_agent.is_empty() {
        page.set_user_agent(user_agent).await?;
    }
    page.set_viewport(VIEWPORT.0, VIEWPORT.1).await?;
    Ok((context_id, page))
}

fn browser_error(e: CdpError) -> TokenhoundError {
    match e {
        CdpError::Timeout { after, .. } => TokenhoundError::Timeout(after),
        other => TokenhoundError::Browser(other.to_string()),
    }
}

struct ChromeSession {
    browser: Browser,
    context_id: Option<String>,
    page: Option<Page>,
}

impl ChromeSession {
    fn page(&self) -> Result<&Page, TokenhoundError> {
        self.page
            .as_ref()
            .ok_or_else(|| TokenhoundError::Browser("page already closed".to_string()))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitUntil,
        deadline: Duration,
    ) -> Result<(), TokenhoundError> {
        self.page()?
            .goto(url, wait, deadline)
            .await
            .map_err(browser_error)
    }

    async fn body_text(&mut self) -> Result<String, TokenhoundError> {
        self.page()?.inner_text().await.map_err(browser_error)
    }

    async fn html(&mut self) -> Result<String, TokenhoundError> {
        self.page()?.content().await.map_err(browser_error)
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        deadline: Duration,
    ) -> Result<(), TokenhoundError> {
        self.page()?
            .wait_for_selector(selector, deadline)
            .await
            .map_err(browser_error)
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!(error = %e, "Error closing page");
            }
        }
        if let Some(context_id) = self.context_id.take() {
            if let Err(e) = self.browser.dispose_context(&context_id).await {
                warn!(error = %e, "Error closing context");
            }
        }
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Error closing browser");
        }
    }
}
