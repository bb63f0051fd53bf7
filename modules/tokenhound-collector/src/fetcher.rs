use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use tokenhound_common::config::FetchTimings;
use tokenhound_common::{CollectorConfig, ListingRow, TokenhoundError};

use crate::browser::{BrowserLauncher, BrowserSession, WaitUntil};
use crate::extract::{challenge_marker, extract_rows, TABLE_READY_SELECTOR};

// --- PageSource trait ---

/// Anything that can produce the rows of one listing page.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Rows for `page`. An empty vec means the page rendered with no rows.
    async fn fetch_page(&self, page: u32, user_agent: &str) -> Result<Vec<ListingRow>, TokenhoundError>;
}

// --- PageFetcher ---

/// Renders one listing page in a fresh, isolated browser session.
///
/// Every call launches its own session and tears it down before
/// returning, whether extraction succeeded or not.
pub struct PageFetcher {
    launcher: Arc<dyn BrowserLauncher>,
    config: CollectorConfig,
}

impl PageFetcher {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: &CollectorConfig) -> Self {
        Self {
            launcher,
            config: config.clone(),
        }
    }

    fn timings(&self) -> &FetchTimings {
        &self.config.fetch
    }

    async fn fetch_in_session(
        &self,
        page: u32,
        user_agent: &str,
    ) -> Result<Vec<ListingRow>, TokenhoundError> {
        let url = self.config.page_url(page);

        let mut session = match self.launcher.launch(user_agent).await {
            Ok(session) => session,
            Err(e) => {
                self.launcher.sweep().await;
                return Err(e);
            }
        };

        let outcome = self.render_and_extract(session.as_mut(), &url).await;

        session.close().await;
        self.launcher.sweep().await;

        outcome
    }

    async fn render_and_extract(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
    ) -> Result<Vec<ListingRow>, TokenhoundError> {
        info!(url, "Navigating to listing page");
        if let Err(e) = session
            .navigate(url, WaitUntil::NetworkIdle, self.timings().network_idle_deadline)
            .await
        {
            warn!(url, error = %e, "Network idle failed, retrying with DOM content loaded");
            session
                .navigate(url, WaitUntil::DomContentLoaded, self.timings().dom_loaded_deadline)
                .await?;
        }

        // Challenge interstitials resolve themselves given a few seconds.
        tokio::time::sleep(self.timings().settle).await;

        let text = session.body_text().await?;
        if let Some(marker) = challenge_marker(&text) {
            return Err(TokenhoundError::Blocked(marker.to_string()));
        }

        session
            .wait_for_selector(TABLE_READY_SELECTOR, self.timings().content_wait)
            .await
            .map_err(|e| match e {
                TokenhoundError::Timeout(after) => TokenhoundError::Extraction(format!(
                    "listing table did not render within {after:?}"
                )),
                other => other,
            })?;

        let html = session.html().await?;
        extract_rows(&html, &self.config.site_origin)
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch_page(&self, page: u32, user_agent: &str) -> Result<Vec<ListingRow>, TokenhoundError> {
        let rows = self.fetch_in_session(page, user_agent).await?;
        info!(page, rows = rows.len(), "Listing page extracted");
        Ok(rows)
    }
}
