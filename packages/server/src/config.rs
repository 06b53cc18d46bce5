use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::{S3Config, StorageBackend, StorageConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of a login session. Default: 168 (7 days).
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

fn default_token_ttl_hours() -> i64 {
    168
}

/// How much access new accounts start with.
#[derive(Debug, Deserialize, Clone)]
pub struct AccessConfig {
    /// Days granted on self-registration. Default: 0 (an admin must extend it).
    #[serde(default)]
    pub signup_grant_days: i64,
    /// Days granted when an admin creates an account without an explicit expiry. Default: 30.
    #[serde(default = "default_admin_grant_days")]
    pub admin_grant_days: i64,
}

fn default_admin_grant_days() -> i64 {
    30
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            signup_grant_days: 0,
            admin_grant_days: default_admin_grant_days(),
        }
    }
}

/// Optional administrator account created on startup if missing.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BootstrapConfig {
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("LECTERN_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("auth.token_ttl_hours", 168)?
            .set_default("storage.backend", "filesystem")?
            .set_default("storage.root", "./data/videos")?
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., LECTERN__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("LECTERN").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
