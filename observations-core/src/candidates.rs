//! Ordered connection targets for the metadata database.
//!
//! Production reaches Cloud SQL through the Unix socket the platform mounts
//! under `<socket_dir>/<instance_connection_name>`; development falls back to
//! a plain TCP host. Targets are tried in order, first success wins.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

use crate::config::DatabaseConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Directory containing the server's `.s.PGSQL.<port>` socket.
    Socket { dir: PathBuf },
    Tcp { host: String, port: u16 },
}

impl ConnectTarget {
    /// Build connect options for this target using the shared credentials.
    pub fn connect_options(&self, config: &DatabaseConfig) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .username(&config.user)
            .database(&config.name)
            .application_name(&config.application_name);

        let options = match &config.password {
            Some(password) => options.password(password),
            None => options,
        };

        let options = match &config.search_path {
            Some(path) => options.options([("search_path", path.as_str())]),
            None => options,
        };

        match self {
            // sqlx appends `.s.PGSQL.<port>` to the socket directory
            ConnectTarget::Socket { dir } => options.socket(dir).port(config.port),
            ConnectTarget::Tcp { host, port } => options.host(host).port(*port),
        }
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::Socket { dir } => write!(f, "unix:{}", dir.display()),
            ConnectTarget::Tcp { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

/// The ordered list of targets plus the settings every attempt shares.
#[derive(Debug, Clone)]
pub struct ConnectionCandidates {
    pub targets: Vec<ConnectTarget>,
    pub acquire_timeout: Duration,
}

impl ConnectionCandidates {
    /// Primary instance socket first, then the development host.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        let socket_dir =
            PathBuf::from(&config.socket_dir).join(&config.instance_connection_name);

        Self {
            targets: vec![
                ConnectTarget::Socket { dir: socket_dir },
                ConnectTarget::Tcp {
                    host: config.fallback_host.clone(),
                    port: config.port,
                },
            ],
            acquire_timeout: Duration::from_secs(config.acquire_timeout_secs),
        }
    }

    pub fn new(targets: Vec<ConnectTarget>, acquire_timeout: Duration) -> Self {
        Self {
            targets,
            acquire_timeout,
        }
    }
}
