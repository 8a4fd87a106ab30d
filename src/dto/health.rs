use serde::Serialize;
use utoipa::ToSchema;

/// Overall service condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Storage reachable, requests are served.
    Ok,
    /// Storage unreachable, game requests fail with 503.
    Degraded,
}

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Name of the installed storage backend, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(storage: &str) -> Self {
        Self {
            status: HealthStatus::Ok,
            storage: Some(storage.to_owned()),
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(storage: Option<&str>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            storage: storage.map(str::to_owned),
        }
    }
}
