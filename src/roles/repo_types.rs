use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Named permission group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub guard_name: String,
}
