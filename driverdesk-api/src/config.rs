/// Configuration for the API server
///
/// Loaded from environment variables (and a `.env` file when present).
///
/// # Environment Variables
///
/// | Variable | Default |
/// |---|---|
/// | `API_HOST` | `0.0.0.0` |
/// | `API_PORT` | `8080` |
/// | `CORS_ORIGINS` | `*` (comma separated) |
/// | `STORAGE_BACKEND` | `postgres` (`postgres` or `memory`) |
/// | `DATABASE_URL` | required for `postgres` |
/// | `DATABASE_MAX_CONNECTIONS` | `10` |
/// | `REDIS_URL` | required for `postgres` |
/// | `SESSION_TTL_SECS` | `2592000` (30 days) |
/// | `AVATAR_BASE_URL` | `https://na.ui-avatars.com/api/` |
/// | `MEDIA_ROOT` | `./media` |
/// | `RESET_URL_BASE` | `http://localhost:8080/password/reset` |
/// | `RESET_THROTTLE_SECS` | `60` |
/// | `MAIL_API_URL` | unset (emails are logged) |
/// | `SMS_PASSWORD_RESET_ENABLED` | `true` |
///
/// # Example
///
/// ```no_run
/// use driverdesk_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Listening on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use driverdesk_shared::auth::session::DEFAULT_SESSION_TTL;
use driverdesk_shared::media::DEFAULT_AVATAR_BASE_URL;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub accounts: AccountsConfig,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

/// Which collaborator implementations back the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Postgres for records, Redis for sessions and events
    Postgres,

    /// Process-local state, lost on restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("Unknown STORAGE_BACKEND: {}", other),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub redis_url: Option<String>,
}

/// Account flow settings
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    /// Lifetime of a login session
    pub session_ttl: Duration,

    /// Avatar service; the display name is appended as `?name=`
    pub avatar_base_url: String,

    /// Directory downloaded media is written to
    pub media_root: PathBuf,

    /// Base of the link mailed for password resets
    pub reset_url_base: String,

    /// Minimum interval between reset links for one email
    pub reset_throttle: Duration,

    /// Mail API endpoint; emails are only logged when unset
    pub mail_api_url: Option<String>,

    /// Mounts `POST /api/driver/sms_password_reset`
    pub sms_password_reset_enabled: bool,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            avatar_base_url: DEFAULT_AVATAR_BASE_URL.to_string(),
            media_root: PathBuf::from("./media"),
            reset_url_base: "http://localhost:8080/password/reset".to_string(),
            reset_throttle: Duration::from_secs(60),
            mail_api_url: None,
            sms_password_reset_enabled: true,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Fails when a value does not parse, or when the Postgres backend is
    /// selected without `DATABASE_URL` / `REDIS_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| -> anyhow::Result<Option<u64>> {
            var(key)
                .map(|v| v.parse::<u64>().with_context(|| format!("{} must be an integer", key)))
                .transpose()
        };

        let api = ApiConfig {
            host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("API_PORT")
                .map(|v| v.parse::<u16>())
                .transpose()
                .context("API_PORT must be a port number")?
                .unwrap_or(8080),
            cors_origins: var("CORS_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
        };

        let backend = var("STORAGE_BACKEND")
            .map(|v| v.parse::<StorageBackend>())
            .transpose()?
            .unwrap_or(StorageBackend::Postgres);

        let storage = StorageConfig {
            backend,
            database_url: var("DATABASE_URL"),
            max_connections: var("DATABASE_MAX_CONNECTIONS")
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("DATABASE_MAX_CONNECTIONS must be an integer")?
                .unwrap_or(10),
            redis_url: var("REDIS_URL"),
        };

        if backend == StorageBackend::Postgres {
            if storage.database_url.is_none() {
                anyhow::bail!("DATABASE_URL environment variable is required");
            }
            if storage.redis_url.is_none() {
                anyhow::bail!("REDIS_URL environment variable is required");
            }
        }

        let defaults = AccountsConfig::default();
        let accounts = AccountsConfig {
            session_ttl: parsed("SESSION_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            avatar_base_url: var("AVATAR_BASE_URL").unwrap_or(defaults.avatar_base_url),
            media_root: var("MEDIA_ROOT").map(PathBuf::from).unwrap_or(defaults.media_root),
            reset_url_base: var("RESET_URL_BASE").unwrap_or(defaults.reset_url_base),
            reset_throttle: parsed("RESET_THROTTLE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.reset_throttle),
            mail_api_url: var("MAIL_API_URL"),
            sms_password_reset_enabled: var("SMS_PASSWORD_RESET_ENABLED")
                .map(|v| parse_flag(&v))
                .transpose()?
                .unwrap_or(defaults.sms_password_reset_enabled),
        };

        Ok(Self {
            api,
            storage,
            accounts,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Invalid boolean value: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_memory_backend_defaults() {
        let config = load(&[("STORAGE_BACKEND", "memory")]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.accounts.avatar_base_url, "https://na.ui-avatars.com/api/");
        assert_eq!(config.accounts.reset_throttle, Duration::from_secs(60));
        assert!(config.accounts.sms_password_reset_enabled);
        assert!(config.accounts.mail_api_url.is_none());
    }

    #[test]
    fn test_postgres_backend_requires_urls() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let err = load(&[("DATABASE_URL", "postgresql://localhost/driverdesk")]).unwrap_err();
        assert!(err.to_string().contains("REDIS_URL"));

        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/driverdesk"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("DATABASE_MAX_CONNECTIONS", "25"),
        ])
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.storage.max_connections, 25);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("STORAGE_BACKEND", "MEMORY"),
            ("API_PORT", "9000"),
            ("CORS_ORIGINS", "https://a.test, https://b.test"),
            ("SESSION_TTL_SECS", "120"),
            ("SMS_PASSWORD_RESET_ENABLED", "off"),
            ("MAIL_API_URL", "https://mail.test/send"),
        ])
        .unwrap();

        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.cors_origins, vec!["https://a.test", "https://b.test"]);
        assert_eq!(config.accounts.session_ttl, Duration::from_secs(120));
        assert!(!config.accounts.sms_password_reset_enabled);
        assert_eq!(config.accounts.mail_api_url.as_deref(), Some("https://mail.test/send"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[("STORAGE_BACKEND", "sqlite")]).is_err());
        assert!(load(&[("STORAGE_BACKEND", "memory"), ("API_PORT", "http")]).is_err());
        assert!(load(&[("STORAGE_BACKEND", "memory"), ("SMS_PASSWORD_RESET_ENABLED", "maybe")]).is_err());
    }

    #[test]
    fn test_max_connections_out_of_range() {
        let err = load(&[
            ("STORAGE_BACKEND", "memory"),
            ("DATABASE_MAX_CONNECTIONS", "4294967296"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));
    }
}
