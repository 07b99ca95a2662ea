//! Server configuration from environment variables.

use std::path::PathBuf;

use tracing::warn;

/// Dev-only default for the admin bearer token gating collateral updates.
const DEFAULT_ADMIN_TOKEN: &str = "enerex-admin-0b9d2f4e6a81";

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port (`PORT`, default 8080).
    pub port: u16,
    /// Directory for best-effort state snapshots (`PERSISTENT_DIR`).
    pub persistent_dir: Option<PathBuf>,
    /// Admin bearer token (`ENEREX_ADMIN_TOKEN`).
    pub admin_token: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        let port = match std::env::var("PORT") {
            Ok(raw) => match raw.parse() {
                Ok(port) => port,
                Err(_) => {
                    warn!(%raw, "invalid PORT value, using 8080");
                    8080
                }
            },
            Err(_) => 8080,
        };
        let persistent_dir = std::env::var_os("PERSISTENT_DIR").map(PathBuf::from);
        let admin_token = std::env::var("ENEREX_ADMIN_TOKEN")
            .unwrap_or_else(|_| DEFAULT_ADMIN_TOKEN.to_string());
        Config {
            port,
            persistent_dir,
            admin_token,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            persistent_dir: None,
            admin_token: DEFAULT_ADMIN_TOKEN.to_string(),
        }
    }
}
