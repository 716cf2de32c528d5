pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

use crate::state::AppState;
use axum::Router;

pub use repo::{PermissionRepository, PgPermissionRepository};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::permission_routes())
}
