use axum::Router;

use crate::state::SharedState;

pub mod auth;
pub mod cards;
pub mod docs;
pub mod game;
pub mod health;
pub mod rankings;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(game::router())
        .merge(cards::router())
        .merge(rankings::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
