use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/checkin", get(handlers::get_checkin))
        .route("/api/checkin/open", post(handlers::open_checkin))
        .route("/api/checkin/answer", post(handlers::answer))
        .route("/api/checkin/close", post(handlers::close_checkin))
        .with_state(state)
}
