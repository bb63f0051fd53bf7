use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::connection::CdpConnection;
use crate::error::{CdpError, Result};

const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// Lifecycle milestone a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// No network activity for roughly half a second.
    NetworkIdle,
    DomContentLoaded,
}

impl WaitUntil {
    fn lifecycle_name(self) -> &'static str {
        match self {
            WaitUntil::NetworkIdle => "networkIdle",
            WaitUntil::DomContentLoaded => "DOMContentLoaded",
        }
    }
}

impl std::fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.lifecycle_name())
    }
}

/// A tab attached through a flattened target session.
pub struct Page {
    conn: Arc<CdpConnection>,
    target_id: String,
    session_id: String,
}

impl Page {
    pub(crate) fn new(conn: Arc<CdpConnection>, target_id: String, session_id: String) -> Self {
        Self {
            conn,
            target_id,
            session_id,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.conn.call(method, params, Some(&self.session_id)).await
    }

    pub(crate) async fn enable(&self) -> Result<()> {
        self.call("Page.enable", json!({})).await?;
        self.call("Page.setLifecycleEventsEnabled", json!({ "enabled": true }))
            .await?;
        Ok(())
    }

    pub async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.call(
            "Emulation.setUserAgentOverride",
            json!({ "userAgent": user_agent }),
        )
        .await?;
        Ok(())
    }

    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await?;
        Ok(())
    }

    /// Navigate and wait for `wait` on the new document, all within `deadline`.
    pub async fn goto(&self, url: &str, wait: WaitUntil, deadline: Duration) -> Result<()> {
        let mut events = self.conn.subscribe();

        let navigation = async {
            let nav = self.call("Page.navigate", json!({ "url": url })).await?;
            if let Some(error) = nav.get("errorText").and_then(Value::as_str) {
                if !error.is_empty() {
                    return Err(CdpError::Navigation(format!("{url}: {error}")));
                }
            }

            // Same-document navigations carry no loader and fire no lifecycle.
            let Some(loader_id) = nav.get("loaderId").and_then(Value::as_str) else {
                return Ok::<(), CdpError>(());
            };

            loop {
                match events.recv().await {
                    Ok(event) => {
                        if event.method == "Page.lifecycleEvent"
                            && event.session_id.as_deref() == Some(self.session_id.as_str())
                            && event.params["loaderId"] == loader_id
                            && event.params["name"] == wait.lifecycle_name()
                        {
                            return Ok(());
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Lifecycle listener lagged");
                    }
                    Err(RecvError::Closed) => return Err(CdpError::ConnectionClosed),
                }
            }
        };

        tokio::time::timeout(deadline, navigation)
            .await
            .map_err(|_| CdpError::timeout(format!("navigation ({wait})"), deadline))??;
        debug!(url, %wait, "Navigation complete");
        Ok(())
    }

    /// Evaluate `expression` in the page and return its JSON value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("uncaught exception");
            return Err(CdpError::Script(message.to_string()));
        }
        Ok(result["result"]["value"].clone())
    }

    /// Serialized DOM of the current document.
    pub async fn content(&self) -> Result<String> {
        let value = self
            .evaluate("document.documentElement ? document.documentElement.outerHTML : ''")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Rendered text of the body.
    pub async fn inner_text(&self) -> Result<String> {
        let value = self
            .evaluate("document.body ? document.body.innerText : ''")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Poll until `selector` matches something or `deadline` passes.
    pub async fn wait_for_selector(&self, selector: &str, deadline: Duration) -> Result<()> {
        let expression = format!("document.querySelector({}) !== null", json!(selector));
        let poll = async {
            loop {
                if self.evaluate(&expression).await?.as_bool() == Some(true) {
                    return Ok::<(), CdpError>(());
                }
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        };

        tokio::time::timeout(deadline, poll)
            .await
            .map_err(|_| CdpError::timeout(format!("selector {selector}"), deadline))?
    }

    pub async fn close(&self) -> Result<()> {
        self.conn
            .call("Target.closeTarget", json!({ "targetId": self.target_id }), None)
            .await?;
        Ok(())
    }
}
