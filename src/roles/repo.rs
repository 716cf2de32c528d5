use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::Role;

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Every role currently in the system.
    async fn all(&self) -> anyhow::Result<Vec<Role>>;

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Role>>;

    /// Returns the role, creating it when missing.
    async fn ensure(&self, name: &str, guard_name: &str) -> anyhow::Result<Role>;
}

#[derive(Clone)]
pub struct PgRoleRepository {
    db: PgPool,
}

impl PgRoleRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn all(&self) -> anyhow::Result<Vec<Role>> {
        let rows = sqlx::query_as::<_, Role>("SELECT id, name, guard_name FROM roles ORDER BY id")
            .fetch_all(&self.db)
            .await
            .context("list roles")?;
        Ok(rows)
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Role>> {
        let row = sqlx::query_as::<_, Role>(
            "SELECT id, name, guard_name FROM roles WHERE name = $1 ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .context("find role by name")?;
        Ok(row)
    }

    async fn ensure(&self, name: &str, guard_name: &str) -> anyhow::Result<Role> {
        let row = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, guard_name)
            VALUES ($1, $2)
            ON CONFLICT (name, guard_name) DO UPDATE SET updated_at = roles.updated_at
            RETURNING id, name, guard_name
            "#,
        )
        .bind(name)
        .bind(guard_name)
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("ensure role {name}"))?;
        Ok(row)
    }
}
