use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use tokenhound_api::{router, AppState};
use tokenhound_common::{telemetry, ApiConfig};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing()?;

    let config = ApiConfig::from_env();
    let state = Arc::new(AppState {
        store_path: config.store_path.clone(),
    });
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!(store = %config.store_path.display(), "Token data API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
