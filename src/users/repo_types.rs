use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub email_verified_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2, never leaves the server
    #[serde(skip_serializing)]
    pub remember_token: Option<String>,
    pub active: bool,
    pub verify: bool,
    pub agree: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub email_verified_at: Option<OffsetDateTime>,
    pub password_hash: String,
    pub remember_token: Option<String>,
    pub active: bool,
    pub verify: bool,
    pub agree: bool,
}

/// Profile fields a user may change; `None` leaves the column as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}
