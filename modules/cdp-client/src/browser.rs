use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::connection::CdpConnection;
use crate::error::{CdpError, Result};
use crate::page::Page;

const DEVTOOLS_BANNER: &str = "DevTools listening on ";

/// How to start the browser process.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub chrome_bin: String,
    /// Extra switches, e.g. `--proxy-server=...`.
    pub args: Vec<String>,
    /// How long to wait for the DevTools endpoint to come up.
    pub startup_deadline: Duration,
    /// How long `close` waits for the process to exit before killing it.
    pub exit_grace: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chrome_bin: "chromium".to_string(),
            args: Vec::new(),
            startup_deadline: Duration::from_secs(20),
            exit_grace: Duration::from_secs(5),
        }
    }
}

impl LaunchOptions {
    pub fn new(chrome_bin: impl Into<String>) -> Self {
        Self {
            chrome_bin: chrome_bin.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// A headless browser process with its own throwaway profile.
pub struct Browser {
    child: Child,
    conn: Arc<CdpConnection>,
    exit_grace: Duration,
    // Removed when the browser is dropped.
    _profile: tempfile::TempDir,
}

impl Browser {
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let profile = tempfile::tempdir()?;

        let mut child = Command::new(&options.chrome_bin)
            .arg("--headless=new")
            .arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .args(&options.args)
            .arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CdpError::Launch(format!("{}: {e}", options.chrome_bin)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CdpError::Launch("stderr not captured".to_string()))?;
        let mut lines = BufReader::new(stderr).lines();

        let ws_url = tokio::time::timeout(options.startup_deadline, async {
            while let Some(line) = lines.next_line().await? {
                if let Some(url) = line.split(DEVTOOLS_BANNER).nth(1) {
                    return Ok::<String, CdpError>(url.trim().to_string());
                }
                debug!(line = %line, "chrome stderr");
            }
            Err(CdpError::Launch(
                "browser exited before announcing DevTools endpoint".to_string(),
            ))
        })
        .await
        .map_err(|_| CdpError::timeout("browser startup", options.startup_deadline))??;

        // Keep draining stderr so the pipe never fills up.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(line = %line, "chrome stderr");
            }
        });

        let conn = CdpConnection::connect(&ws_url).await?;
        info!(pid = ?child.id(), ws_url = %ws_url, "Browser launched");

        Ok(Self {
            child,
            conn: Arc::new(conn),
            exit_grace: options.exit_grace,
            _profile: profile,
        })
    }

    /// Create an isolated browsing context (separate cookies and storage).
    pub async fn new_context(&self) -> Result<String> {
        let result = self
            .conn
            .call("Target.createBrowserContext", json!({ "disposeOnDetach": true }), None)
            .await?;
        string_field(&result, "browserContextId")
    }

    pub async fn dispose_context(&self, context_id: &str) -> Result<()> {
        self.conn
            .call(
                "Target.disposeBrowserContext",
                json!({ "browserContextId": context_id }),
                None,
            )
            .await?;
        Ok(())
    }

    /// Open a blank tab in `context_id` and attach to it.
    pub async fn new_page(&self, context_id: &str) -> Result<Page> {
        let created = self
            .conn
            .call(
                "Target.createTarget",
                json!({ "url": "about:blank", "browserContextId": context_id }),
                None,
            )
            .await?;
        let target_id = string_field(&created, "targetId")?;

        let attached = self
            .conn
            .call(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                None,
            )
            .await?;
        let session_id = string_field(&attached, "sessionId")?;

        let page = Page::new(self.conn.clone(), target_id, session_id);
        page.enable().await?;
        Ok(page)
    }

    /// Ask the browser to exit, then make sure the process is gone.
    pub async fn close(&mut self) -> Result<()> {
        match self.conn.call("Browser.close", json!({}), None).await {
            // The socket usually drops before the reply arrives.
            Ok(_) | Err(CdpError::ConnectionClosed) => {}
            Err(e) => warn!(error = %e, "Browser.close failed, killing process"),
        }

        match tokio::time::timeout(self.exit_grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "Browser exited");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(pid = ?self.child.id(), "Browser did not exit in time, killing");
                self.child.kill().await?;
                Ok(())
            }
        }
    }
}

fn string_field(value: &serde_json::Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| CdpError::Protocol {
            code: 0,
            message: format!("response missing {field}"),
        })
}
