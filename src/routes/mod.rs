use axum::Router;

use crate::state::SharedState;

pub mod actor;
pub mod docs;
pub mod health;
pub mod party;
pub mod round;
pub mod session;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = party::router()
        .merge(round::router())
        .merge(session::router())
        .merge(sse::router());

    Router::new()
        .nest("/api/v1", api_router)
        .merge(health::router())
        .merge(docs::router())
        .with_state(state)
}
