use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// A stored file attached to a user under a named collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Media {
    pub id: i64,
    pub user_id: i64,
    pub collection: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: i64,
    #[serde(skip_serializing)]
    pub s3_key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMedia {
    pub user_id: i64,
    pub collection: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: i64,
    pub s3_key: String,
}
