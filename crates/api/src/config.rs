//! Process configuration read from the environment.

use payforge_infra::queue::QueueConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// `Some` selects the Postgres queue store.
    pub database_url: Option<String>,
    pub queue: QueueConfig,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let persistent = lookup("USE_PERSISTENT_STORES")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let database_url = if persistent {
            let url = lookup("DATABASE_URL")
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("USE_PERSISTENT_STORES is set but DATABASE_URL is missing"))?;
            Some(url)
        } else {
            None
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            jwt_secret,
            database_url,
            queue: QueueConfig::from_lookup(&lookup),
        })
    }

    /// In-memory stores, default queue settings.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            queue: QueueConfig::default(),
        }
    }
}
