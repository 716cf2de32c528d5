use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::dto::PermissionPayload;
use super::repo_types::Permission;
use crate::criteria::Criteria;
use crate::pagination::{Page, PageRequest};

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn find(&self, id: i64) -> anyhow::Result<Option<Permission>>;

    /// Whether another permission already uses this name and guard.
    async fn name_taken(
        &self,
        name: &str,
        guard_name: &str,
        except: Option<i64>,
    ) -> anyhow::Result<bool>;

    async fn create(&self, payload: &PermissionPayload) -> anyhow::Result<Permission>;

    /// Replaces every field. `None` when no such permission exists.
    async fn update(&self, payload: &PermissionPayload, id: i64)
        -> anyhow::Result<Option<Permission>>;

    /// `false` when nothing was deleted.
    async fn delete(&self, id: i64) -> anyhow::Result<bool>;

    async fn paginate(
        &self,
        criteria: Option<&Criteria>,
        page: PageRequest,
    ) -> anyhow::Result<Page<Permission>>;
}

const COLUMNS: &str = "id, name, guard_name, created_at, updated_at";

#[derive(Clone)]
pub struct PgPermissionRepository {
    db: PgPool,
}

impl PgPermissionRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
    async fn find(&self, id: i64) -> anyhow::Result<Option<Permission>> {
        let row = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {COLUMNS} FROM permissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find permission")?;
        Ok(row)
    }

    async fn name_taken(
        &self,
        name: &str,
        guard_name: &str,
        except: Option<i64>,
    ) -> anyhow::Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM permissions
                 WHERE name = $1 AND guard_name = $2
                   AND ($3::BIGINT IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(name)
        .bind(guard_name)
        .bind(except)
        .fetch_one(&self.db)
        .await
        .context("check permission name")?;
        Ok(taken)
    }

    async fn create(&self, payload: &PermissionPayload) -> anyhow::Result<Permission> {
        let row = sqlx::query_as::<_, Permission>(&format!(
            "INSERT INTO permissions (name, guard_name) VALUES ($1, $2) RETURNING {COLUMNS}"
        ))
        .bind(payload.name())
        .bind(payload.guard())
        .fetch_one(&self.db)
        .await
        .context("insert permission")?;
        Ok(row)
    }

    async fn update(
        &self,
        payload: &PermissionPayload,
        id: i64,
    ) -> anyhow::Result<Option<Permission>> {
        let row = sqlx::query_as::<_, Permission>(&format!(
            r#"
            UPDATE permissions
               SET name = $1, guard_name = $2, updated_at = NOW()
             WHERE id = $3
            RETURNING {COLUMNS}
            "#
        ))
        .bind(payload.name())
        .bind(payload.guard())
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("update permission")?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete permission")?;
        Ok(done.rows_affected() > 0)
    }

    async fn paginate(
        &self,
        criteria: Option<&Criteria>,
        page: PageRequest,
    ) -> anyhow::Result<Page<Permission>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM permissions");
        if let Some(c) = criteria {
            c.push_where(&mut count);
        }
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.db)
            .await
            .context("count permissions")?;

        let mut q = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM permissions"));
        if let Some(c) = criteria {
            c.push_where(&mut q);
        }
        Criteria::push_order(criteria, &mut q);
        q.push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = q
            .build_query_as::<Permission>()
            .fetch_all(&self.db)
            .await
            .context("list permissions")?;

        Ok(Page::new(rows, page, total))
    }
}
