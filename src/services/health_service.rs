use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `ok` when the store answers its health probe, `degraded` otherwise.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::party_store::memory::MemoryPartyStore, dto::health::HealthStatus,
        state::AppState,
    };

    #[tokio::test]
    async fn memory_store_reports_ok() {
        let state = AppState::new(Arc::new(MemoryPartyStore::new()), AppConfig::default());
        assert_eq!(health_status(&state).await.status, HealthStatus::Ok);
    }
}
