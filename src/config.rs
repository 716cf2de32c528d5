use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// When unset the seeder generates a random password for the account.
    pub supermost_admin_password: Option<String>,
    pub factory_users: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub seed: SeedConfig,
    pub per_page: u32,
    pub upload_max_bytes: usize,
    pub media_url_ttl_secs: u64,
    pub validation_rules_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "gatehouse".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "gatehouse-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".into()),
            bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "gatehouse".into()),
            access_key: std::env::var("MINIO_ACCESS_KEY").unwrap_or_default(),
            secret_key: std::env::var("MINIO_SECRET_KEY").unwrap_or_default(),
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let seed = SeedConfig {
            supermost_admin_password: std::env::var("SUPERMOST_ADMIN_PASSWORD")
                .ok()
                .filter(|v| !v.is_empty()),
            factory_users: env_or("SEED_FACTORY_USERS", 5),
        };
        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            jwt,
            storage,
            seed,
            per_page: env_or("PAGINATION_PER_PAGE", 15),
            upload_max_bytes: env_or("UPLOAD_MAX_BYTES", 20 * 1024 * 1024),
            media_url_ttl_secs: env_or("MEDIA_URL_TTL_SECS", 30 * 60),
            validation_rules_path: std::env::var("VALIDATION_RULES_PATH").ok(),
        })
    }
}

impl AppConfig {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid APP_HOST {:?}", self.host))
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(std::env::var(key).ok().as_deref(), default)
}

fn parse_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_on_missing_or_garbage() {
        assert_eq!(parse_or::<u32>(None, 15), 15);
        assert_eq!(parse_or::<u32>(Some("abc"), 15), 15);
        assert_eq!(parse_or::<u32>(Some(" 25 "), 15), 25);
        assert_eq!(parse_or::<i64>(Some("-1"), 60), -1);
    }

    #[test]
    fn bind_addr_comes_from_host_and_port() {
        let mut config = crate::testing::test_config();
        config.host = "127.0.0.1".into();
        config.port = 9090;
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:9090");

        config.host = "not a host".into();
        assert!(config.bind_addr().is_err());
    }
}
