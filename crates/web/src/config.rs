use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for the `web` CLI verb. Mirrors the plain-struct shape the
/// builder and database crates use for their own per-verb config (parsed
/// from environment/CLI flags by `repoforge-cli`, not by this crate).
#[derive(Debug, Clone)]
pub struct WebConfig {
    pub bind_addr: SocketAddr,
    /// Static assets for the log-viewer UI, if configured. `None` disables
    /// the `/` fallback route entirely (the UI itself is out of scope).
    pub static_dir: Option<PathBuf>,
}
