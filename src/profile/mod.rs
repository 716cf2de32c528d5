mod dto;
pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub fn router(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes(upload_max_bytes))
}
