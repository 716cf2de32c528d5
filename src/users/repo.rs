use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{NewUser, ProfileUpdate, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find(&self, id: i64) -> anyhow::Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn email_taken(&self, email: &str, except: Option<i64>) -> anyhow::Result<bool>;

    async fn create(&self, user: &NewUser) -> anyhow::Result<User>;

    /// `None` when no such user exists.
    async fn update_profile(&self, id: i64, update: &ProfileUpdate)
        -> anyhow::Result<Option<User>>;

    /// Empties the user table together with everything hanging off it.
    async fn truncate(&self) -> anyhow::Result<()>;

    async fn assign_roles(&self, user_id: i64, role_ids: &[i64]) -> anyhow::Result<()>;

    async fn role_names(&self, user_id: i64) -> anyhow::Result<Vec<String>>;
}

const COLUMNS: &str = "id, name, email, email_verified_at, password_hash, remember_token, \
                       active, verify, agree, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.db)
                .await
                .context("find user by email")?;
        Ok(user)
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> anyhow::Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.db)
        .await
        .context("check user email")?;
        Ok(taken)
    }

    async fn create(&self, user: &NewUser) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, email_verified_at, password_hash, remember_token,
                               active, verify, agree)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.email_verified_at)
        .bind(&user.password_hash)
        .bind(&user.remember_token)
        .bind(user.active)
        .bind(user.verify)
        .bind(user.agree)
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("insert user {}", user.email))?;
        Ok(row)
    }

    async fn update_profile(
        &self,
        id: i64,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   updated_at = NOW()
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.email)
        .fetch_optional(&self.db)
        .await
        .context("update user profile")?;
        Ok(row)
    }

    async fn truncate(&self) -> anyhow::Result<()> {
        sqlx::query("TRUNCATE TABLE users RESTART IDENTITY CASCADE")
            .execute(&self.db)
            .await
            .context("truncate users")?;
        Ok(())
    }

    async fn assign_roles(&self, user_id: i64, role_ids: &[i64]) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_ids)
        .execute(&self.db)
        .await
        .with_context(|| format!("assign roles to user {user_id}"))?;
        Ok(())
    }

    async fn role_names(&self, user_id: i64) -> anyhow::Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name
              FROM roles r
              JOIN user_roles ur ON ur.role_id = r.id
             WHERE ur.user_id = $1
             ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list user roles")?;
        Ok(names)
    }
}
