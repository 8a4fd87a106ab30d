/// OpenAPI documentation generation.
pub mod documentation;
/// Thin game operations mapping the session manager onto DTOs.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Deck leaderboards and per-user ranking summaries.
pub mod ranking_service;
/// Answer normalization and points computation.
pub mod scoring;
/// Game session lifecycle and ranking reconciliation.
pub mod session_manager;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Turn order for strict-turn games.
pub mod turns;
