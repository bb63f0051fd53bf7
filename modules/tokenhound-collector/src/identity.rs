use async_trait::async_trait;
use tor_control::{TorControlClient, TorControlError};

/// Requests a fresh egress identity from the anonymizing proxy.
#[async_trait]
pub trait IdentityRotator: Send + Sync {
    async fn rotate(&self) -> Result<(), TorControlError>;

    /// Whether the control endpoint answers at all.
    async fn is_reachable(&self) -> bool;
}

#[async_trait]
impl IdentityRotator for TorControlClient {
    async fn rotate(&self) -> Result<(), TorControlError> {
        self.new_identity().await
    }

    async fn is_reachable(&self) -> bool {
        self.check_reachable().await
    }
}
