pub mod repo;
pub mod repo_types;

pub use repo::{PgRoleRepository, RoleRepository};
pub use repo_types::Role;
