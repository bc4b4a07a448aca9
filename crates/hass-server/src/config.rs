//! Server configuration, read from flags with environment fallbacks.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "hass-server")]
#[command(about = "HASS hospital management API server")]
#[command(version)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "HASS_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// SQLite database URL (`sqlite::memory:` for a throwaway database)
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://hass.db")]
    pub database_url: String,

    /// Secret used to sign access and refresh tokens
    #[arg(long, env = "HASS_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,

    /// Access token lifetime in minutes
    #[arg(long, env = "HASS_ACCESS_TOKEN_MINUTES", default_value_t = 60)]
    pub access_token_minutes: i64,

    /// Refresh token lifetime in days
    #[arg(long, env = "HASS_REFRESH_TOKEN_DAYS", default_value_t = 7)]
    pub refresh_token_days: i64,

    /// Directory uploaded files are written to
    #[arg(long, env = "HASS_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Largest accepted upload in bytes
    #[arg(long, env = "HASS_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: u64,

    /// Super admin created on first start when no users exist
    #[arg(long, env = "HASS_BOOTSTRAP_EMAIL")]
    pub bootstrap_email: Option<String>,

    #[arg(long, env = "HASS_BOOTSTRAP_PASSWORD", hide_env_values = true)]
    pub bootstrap_password: Option<String>,

    /// Load the demo hospital with one account per role
    #[arg(long, env = "HASS_SEED_DEMO", default_value_t = false)]
    pub seed_demo: bool,

    /// Log filter, e.g. `info,hass_server=debug`
    #[arg(long, env = "RUST_LOG", default_value = "info,tower_http=info")]
    pub log_filter: String,
}

impl ServerConfig {
    /// Configuration for tests and embedded use: in-memory database, demo data, random bind port.
    pub fn ephemeral() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: "sqlite::memory:".to_string(),
            token_secret: None,
            access_token_minutes: 60,
            refresh_token_days: 7,
            upload_dir: std::env::temp_dir().join(format!("hass-uploads-{}", uuid::Uuid::new_v4())),
            max_upload_bytes: 10 * 1024 * 1024,
            bootstrap_email: None,
            bootstrap_password: None,
            seed_demo: true,
            log_filter: "warn".to_string(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::parse_from(["hass-server"]);
        assert_eq!(config.bind.port(), 8000);
        assert_eq!(config.access_token_minutes, 60);
        assert!(!config.seed_demo);
    }

    #[test]
    fn test_flags_override() {
        let config = ServerConfig::parse_from([
            "hass-server",
            "--bind",
            "0.0.0.0:9000",
            "--database-url",
            "sqlite::memory:",
            "--seed-demo",
        ]);
        assert_eq!(config.bind.port(), 9000);
        assert!(config.is_in_memory());
        assert!(config.seed_demo);
    }
}
