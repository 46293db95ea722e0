use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Environment variables the deployment sets for the database connection.
pub const ENV_INSTANCE_CONNECTION_NAME: &str = "INSTANCE_CONNECTION_NAME";
pub const ENV_POSTGRES_USER: &str = "POSTGRES_USER";
pub const ENV_POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
pub const ENV_POSTGRES_DATABASE: &str = "POSTGRES_DATABASE";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ObservationsConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Cloud SQL instance, `project:region:instance`.
    pub instance_connection_name: String,
    /// Directory holding one socket directory per Cloud SQL instance.
    pub socket_dir: String,
    /// Development fallback when the instance socket is unreachable.
    pub fallback_host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
    pub acquire_timeout_secs: u64,
    pub application_name: String,
    /// Schema search path for the session, when the tables live outside `public`.
    pub search_path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            instance_connection_name: "panoptes-survey:us-central1:panoptes-meta".to_string(),
            socket_dir: "/cloudsql".to_string(),
            fallback_host: "localhost".to_string(),
            port: 5432,
            user: "panoptes".to_string(),
            password: None,
            name: "metadata".to_string(),
            acquire_timeout_secs: 30,
            application_name: "observations-data".to_string(),
            search_path: None,
        }
    }
}

// Hand-written so the password never reaches a log line.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("instance_connection_name", &self.instance_connection_name)
            .field("socket_dir", &self.socket_dir)
            .field("fallback_host", &self.fallback_host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("application_name", &self.application_name)
            .field("search_path", &self.search_path)
            .finish()
    }
}

impl ObservationsConfig {
    /// Load config from an optional TOML file, then apply the deployment's
    /// environment variables on top.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`ObservationsConfig::load`] with an injectable environment lookup.
    pub fn load_with_env<F>(path: &str, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .set_override_option(
                "database.instance_connection_name",
                env(ENV_INSTANCE_CONNECTION_NAME),
            )?
            .set_override_option("database.user", env(ENV_POSTGRES_USER))?
            .set_override_option("database.password", env(ENV_POSTGRES_PASSWORD))?
            .set_override_option("database.name", env(ENV_POSTGRES_DATABASE))?
            .build()?;
        s.try_deserialize()
    }
}
