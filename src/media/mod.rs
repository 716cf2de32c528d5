pub mod repo;
pub mod repo_types;
pub mod services;

pub use repo::{MediaRepository, PgMediaRepository};
pub use repo_types::{Media, NewMedia};
