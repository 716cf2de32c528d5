//! Bootstrap data: baseline roles, the fixed administrative accounts and a
//! handful of generated users.

use std::sync::Arc;

use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    auth::password::{hash_password, random_string},
    config::SeedConfig,
    roles::RoleRepository,
    state::AppState,
    users::{factory::UserFactory, NewUser, UserRepository},
};

const GUARD: &str = "web";
const BASELINE_ROLES: &[&str] = &["super-admin", "admin", "user"];
const FACTORY_ROLE: &str = "user";

enum RoleGrant {
    /// Every role present when the account is seeded.
    All,
    Named(&'static str),
}

struct FixedAccount {
    name: &'static str,
    email: &'static str,
    password_len: usize,
    roles: RoleGrant,
}

const SUPERMOST_EMAIL: &str = "supermost@admin.com";

const FIXED_ACCOUNTS: &[FixedAccount] = &[
    FixedAccount {
        name: "System Admin",
        email: "system@admin.com",
        password_len: 32,
        roles: RoleGrant::All,
    },
    FixedAccount {
        name: "Supermost Admin",
        email: SUPERMOST_EMAIL,
        password_len: 32,
        roles: RoleGrant::All,
    },
    FixedAccount {
        name: "Account Manager",
        email: "account@manager.com",
        password_len: 16,
        roles: RoleGrant::Named("admin"),
    },
    FixedAccount {
        name: "Guest",
        email: "guest@admin.com",
        password_len: 16,
        roles: RoleGrant::Named("admin"),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub fixed: usize,
    pub factory: usize,
}

pub struct UsersTableSeeder {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    config: SeedConfig,
}

impl UsersTableSeeder {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        config: SeedConfig,
    ) -> Self {
        Self {
            users,
            roles,
            config,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.roles.clone(),
            state.config.seed.clone(),
        )
    }

    /// Overrides the configured number of generated users.
    pub fn with_factory_users(mut self, count: usize) -> Self {
        self.config.factory_users = count;
        self
    }

    /// Wipes users and reseeds. Not transactional: a failure part way
    /// through leaves whatever was inserted before it.
    pub async fn run(&self) -> anyhow::Result<SeedReport> {
        self.users.truncate().await.context("truncate users")?;
        info!("users table truncated");

        for role in BASELINE_ROLES {
            self.roles
                .ensure(role, GUARD)
                .await
                .with_context(|| format!("ensure role {role}"))?;
        }

        for account in FIXED_ACCOUNTS {
            self.seed_fixed(account).await?;
        }

        let factory = self.seed_factory().await?;
        let report = SeedReport {
            fixed: FIXED_ACCOUNTS.len(),
            factory,
        };
        info!(fixed = report.fixed, factory = report.factory, "seeding finished");
        Ok(report)
    }

    async fn seed_fixed(&self, account: &FixedAccount) -> anyhow::Result<()> {
        let password = if account.email == SUPERMOST_EMAIL {
            match &self.config.supermost_admin_password {
                Some(p) => p.clone(),
                None => {
                    warn!(
                        email = account.email,
                        "SUPERMOST_ADMIN_PASSWORD not set, using a random password"
                    );
                    random_string(account.password_len)
                }
            }
        } else {
            random_string(account.password_len)
        };

        let user = self
            .users
            .create(&NewUser {
                name: account.name.to_string(),
                email: account.email.to_string(),
                email_verified_at: Some(OffsetDateTime::now_utc()),
                password_hash: hash_password(&password)?,
                remember_token: Some(random_string(10)),
                active: true,
                verify: true,
                agree: true,
            })
            .await
            .with_context(|| format!("create {}", account.email))?;

        let role_ids: Vec<i64> = match account.roles {
            RoleGrant::All => self.roles.all().await?.into_iter().map(|r| r.id).collect(),
            RoleGrant::Named(name) => {
                let role = self
                    .roles
                    .find_by_name(name)
                    .await?
                    .with_context(|| format!("role {name} does not exist"))?;
                vec![role.id]
            }
        };
        self.users.assign_roles(user.id, &role_ids).await?;

        info!(user_id = user.id, email = account.email, roles = role_ids.len(), "account seeded");
        Ok(())
    }

    async fn seed_factory(&self) -> anyhow::Result<usize> {
        let count = self.config.factory_users;
        if count == 0 {
            return Ok(0);
        }
        let role = self
            .roles
            .find_by_name(FACTORY_ROLE)
            .await?
            .with_context(|| format!("role {FACTORY_ROLE} does not exist"))?;

        let factory = UserFactory::new(hash_password(&random_string(16))?);
        for _ in 0..count {
            // scoped so the thread rng is not held across an await
            let new_user = {
                let mut rng = rand::thread_rng();
                factory.make(&mut rng)
            };
            let user = self.users.create(&new_user).await?;
            self.users.assign_roles(user.id, &[role.id]).await?;
        }
        info!(count, "factory users seeded");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::password::verify_password, testing::MemoryStore};

    fn seeder(store: &Arc<MemoryStore>, config: SeedConfig) -> UsersTableSeeder {
        UsersTableSeeder::new(store.clone(), store.clone(), config)
    }

    fn config(password: Option<&str>, factory_users: usize) -> SeedConfig {
        SeedConfig {
            supermost_admin_password: password.map(str::to_string),
            factory_users,
        }
    }

    #[tokio::test]
    async fn seeds_fixed_and_factory_users() {
        let store = MemoryStore::new();
        let report = seeder(&store, config(Some("correct horse"), 5))
            .run()
            .await
            .unwrap();
        assert_eq!(report, SeedReport { fixed: 4, factory: 5 });
        assert_eq!(store.user_count(), 9);
        assert_eq!(store.role_count(), 3);

        let users = store.users();
        for user in &users {
            assert!(user.active && user.verify && user.agree);
            assert_eq!(user.remember_token.as_deref().map(str::len), Some(10));
            assert!(user.email_verified_at.is_some());
            assert!(!UserRepository::role_names(store.as_ref(), user.id)
                .await
                .unwrap()
                .is_empty());
        }

        let supermost = users.iter().find(|u| u.email == SUPERMOST_EMAIL).unwrap();
        assert!(verify_password("correct horse", &supermost.password_hash).unwrap());
    }

    #[tokio::test]
    async fn admins_get_every_role_others_get_one() {
        let store = MemoryStore::new();
        seeder(&store, config(None, 2)).run().await.unwrap();

        let roles_of = |email: &'static str| {
            let store = store.clone();
            async move {
                let user = UserRepository::find_by_email(store.as_ref(), email)
                    .await
                    .unwrap()
                    .unwrap();
                UserRepository::role_names(store.as_ref(), user.id)
                    .await
                    .unwrap()
            }
        };
        let all = vec!["admin".to_string(), "super-admin".into(), "user".into()];
        assert_eq!(roles_of("system@admin.com").await, all);
        assert_eq!(roles_of(SUPERMOST_EMAIL).await, all);
        assert_eq!(roles_of("account@manager.com").await, vec!["admin".to_string()]);
        assert_eq!(roles_of("guest@admin.com").await, vec!["admin".to_string()]);
    }

    #[tokio::test]
    async fn rerun_replaces_instead_of_duplicating() {
        let store = MemoryStore::new();
        let seeder = seeder(&store, config(None, 3));
        seeder.run().await.unwrap();
        seeder.run().await.unwrap();
        assert_eq!(store.user_count(), 7);
        assert_eq!(store.role_count(), 3);
        // identity restarts with the table
        assert_eq!(store.users()[0].id, 1);
    }

    #[tokio::test]
    async fn factory_override_wins_over_config() {
        let store = MemoryStore::new();
        let report = seeder(&store, config(None, 5))
            .with_factory_users(0)
            .run()
            .await
            .unwrap();
        assert_eq!(report.factory, 0);
        assert_eq!(store.user_count(), 4);
    }

    #[tokio::test]
    async fn all_grant_includes_roles_beyond_the_baseline() {
        let store = MemoryStore::new();
        store.ensure("editor", "web").await.unwrap();
        store.ensure("auditor", "api").await.unwrap();
        seeder(&store, config(None, 1)).run().await.unwrap();
        assert_eq!(store.role_count(), 5);

        for email in ["system@admin.com", SUPERMOST_EMAIL] {
            let user = UserRepository::find_by_email(store.as_ref(), email)
                .await
                .unwrap()
                .unwrap();
            let roles = UserRepository::role_names(store.as_ref(), user.id).await.unwrap();
            assert_eq!(roles, vec!["admin", "auditor", "editor", "super-admin", "user"]);
        }

        let guest = UserRepository::find_by_email(store.as_ref(), "guest@admin.com")
            .await
            .unwrap()
            .unwrap();
        let roles = UserRepository::role_names(store.as_ref(), guest.id).await.unwrap();
        assert_eq!(roles, vec!["admin"]);
    }
}
