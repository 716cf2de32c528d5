use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::{
    config::AppConfig,
    media::{MediaRepository, PgMediaRepository},
    permissions::{PermissionRepository, PgPermissionRepository},
    roles::{PgRoleRepository, RoleRepository},
    storage::{S3Storage, StorageClient},
    users::{PgUserRepository, UserRepository},
    validation::{
        registry::{PERMISSION_CREATE, PERMISSION_UPDATE},
        EntityValidator, RuleRegistry,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub media: Arc<dyn MediaRepository>,
    pub storage: Arc<dyn StorageClient>,
    pub rules: Arc<RuleRegistry>,
    pub permission_validator: Arc<EntityValidator>,
}

pub async fn connect_db(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to postgres")?;
    info!(max_connections = config.db_max_connections, "database pool ready");
    Ok(db)
}

impl AppState {
    pub async fn init(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let storage = Arc::new(S3Storage::connect(&config.storage).await?) as Arc<dyn StorageClient>;
        let rules = RuleRegistry::load(config.validation_rules_path.as_deref())?;

        Self::from_parts(
            config,
            Arc::new(PgPermissionRepository::new(db.clone())),
            Arc::new(PgUserRepository::new(db.clone())),
            Arc::new(PgRoleRepository::new(db.clone())),
            Arc::new(PgMediaRepository::new(db)),
            storage,
            rules,
        )
    }

    pub fn from_parts(
        config: AppConfig,
        permissions: Arc<dyn PermissionRepository>,
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        media: Arc<dyn MediaRepository>,
        storage: Arc<dyn StorageClient>,
        rules: RuleRegistry,
    ) -> anyhow::Result<Self> {
        let permission_validator = rules.entity(PERMISSION_CREATE, PERMISSION_UPDATE)?;
        Ok(Self {
            config: Arc::new(config),
            permissions,
            users,
            roles,
            media,
            storage,
            rules: Arc::new(rules),
            permission_validator: Arc::new(permission_validator),
        })
    }

    /// Every repository backed by one shared in-memory store.
    #[cfg(test)]
    pub fn from_store(store: Arc<crate::testing::MemoryStore>) -> Self {
        Self::from_parts(
            crate::testing::test_config(),
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            Arc::new(crate::testing::FakeStorage),
            RuleRegistry::builtin().expect("built-in rules"),
        )
        .expect("fake state")
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::from_store(crate::testing::MemoryStore::new())
    }
}
