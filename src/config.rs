use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "/var/lib/shortlink/shorturl.sqlite";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem path of the sqlite store.
    pub db_path: PathBuf,
    /// Public base for generated short links. When unset, the base is
    /// derived per-request from the `Host` header.
    pub base_url: Option<String>,
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = env::var("SHORTURL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH));

        let base_url = env::var("SHORTURL_BASE_URL")
            .ok()
            .map(|base| base.trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty());

        let listen_addr = env::var("SHORTURL_LISTEN")
            .ok()
            .and_then(|addr| addr.parse().ok())
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.parse().unwrap());

        Self {
            db_path,
            base_url,
            listen_addr,
        }
    }
}
