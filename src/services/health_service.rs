use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the storage backend and report whether requests can be served.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(backend) = state.backend().await else {
        warn!("storage unavailable (degraded mode)");
        return HealthResponse::degraded(None);
    };

    if let Err(err) = backend.store.health_check().await {
        warn!(storage = backend.label, error = %err, "storage health check failed");
        return HealthResponse::degraded(Some(backend.label));
    }

    if state.is_degraded() {
        HealthResponse::degraded(Some(backend.label))
    } else {
        HealthResponse::ok(backend.label)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{catalog::memory::InMemoryCatalog, session_store::memory::InMemorySessionStore},
        dto::health::HealthStatus,
        state::{AppState, Backend},
    };

    #[tokio::test]
    async fn reports_degraded_without_backend() {
        let state = AppState::new(AppConfig::default());
        let status = health_status(&state).await;
        assert_eq!(status.status, HealthStatus::Degraded);
        assert!(status.storage.is_none());
    }

    #[tokio::test]
    async fn reports_ok_with_memory_backend() {
        let state = AppState::new(AppConfig::default());
        state
            .set_backend(Backend::new(
                "memory",
                Arc::new(InMemorySessionStore::new()),
                Arc::new(InMemoryCatalog::new()),
            ))
            .await;

        let status = health_status(&state).await;
        assert_eq!(status.status, HealthStatus::Ok);
        assert_eq!(status.storage.as_deref(), Some("memory"));
    }
}
