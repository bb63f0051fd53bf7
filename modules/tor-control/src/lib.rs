pub mod error;

pub use error::{Result, TorControlError};

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tracing::{debug, info};

const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Final status of one control-port reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    AuthRejected,
    TooSoon,
    Other(String),
}

/// Classify a single reply line. Returns `None` for mid-reply lines
/// (`250-…`, `250+…`) that are followed by more lines.
pub fn classify_reply(line: &str) -> Option<Reply> {
    let line = line.trim_end();
    if line.len() >= 4 && matches!(line.as_bytes()[3], b'-' | b'+') {
        return None;
    }
    let code = line.get(..3).unwrap_or(line);
    Some(match code {
        "250" => Reply::Ok,
        "515" => Reply::AuthRejected,
        "551" => Reply::TooSoon,
        _ => Reply::Other(line.to_string()),
    })
}

/// Short-lived client for the anonymizing proxy's control port.
///
/// Every call opens a fresh connection, authenticates with the shared
/// secret, issues one command and disconnects. The whole exchange is
/// bounded by `deadline`.
#[derive(Debug, Clone)]
pub struct TorControlClient {
    addr: String,
    password: String,
    deadline: Duration,
}

impl TorControlClient {
    pub fn new(addr: &str, password: &str) -> Self {
        Self {
            addr: addr.to_string(),
            password: password.to_string(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Ask the daemon for a fresh circuit (`SIGNAL NEWNYM`).
    ///
    /// Authentication rejection and "too soon" are surfaced as distinct
    /// errors and never retried here; the daemon enforces its own cooldown.
    pub async fn new_identity(&self) -> Result<()> {
        tokio::time::timeout(self.deadline, self.signal_newnym())
            .await
            .map_err(|_| TorControlError::Timeout(self.deadline))?
    }

    /// Check that the control port accepts connections.
    pub async fn check_reachable(&self) -> bool {
        matches!(
            tokio::time::timeout(self.deadline, TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        )
    }

    async fn signal_newnym(&self) -> Result<()> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| TorControlError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        let auth = format!("AUTHENTICATE \"{}\"\r\n", quote(&self.password));
        write.write_all(auth.as_bytes()).await?;
        expect_ok(&mut lines).await?;
        debug!(addr = %self.addr, "Control port authenticated");

        write.write_all(b"SIGNAL NEWNYM\r\n").await?;
        expect_ok(&mut lines).await?;

        // Best effort; the daemon closes the connection either way.
        let _ = write.write_all(b"QUIT\r\n").await;
        let _ = write.shutdown().await;

        info!(addr = %self.addr, "New circuit identity requested");
        Ok(())
    }
}

async fn expect_ok(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Result<()> {
    loop {
        let Some(line) = lines.next_line().await? else {
            return Err(TorControlError::Protocol(
                "connection closed before reply".to_string(),
            ));
        };
        debug!(reply = line.as_str(), "Control port reply");
        match classify_reply(&line) {
            None => continue,
            Some(Reply::Ok) => return Ok(()),
            Some(Reply::AuthRejected) => return Err(TorControlError::AuthRejected),
            Some(Reply::TooSoon) => return Err(TorControlError::TooSoon),
            Some(Reply::Other(line)) => return Err(TorControlError::Protocol(line)),
        }
    }
}

fn quote(secret: &str) -> String {
    secret.replace('\\', "\\\\").replace('"', "\\\"")
}
