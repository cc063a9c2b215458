//! Application configuration, extracted from the environment.

use serde::Deserialize;

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_todo_timeout() -> u64 {
    30
}

/// Service configuration. Every field maps to an environment variable of the
/// same (uppercased) name; `.env` files are honored via dotenvy.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Origin used to validate redirect targets and build absolute URLs,
    /// e.g. `https://qc.example.org`.
    pub public_origin: String,

    /// Root directory holding per-study folders (README.md lives under
    /// `<archive_root>/<study_id>/`).
    pub archive_root: std::path::PathBuf,

    /// Path to the QC todo binary invoked by `GET /todo`.
    #[serde(default)]
    pub todo_binary: Option<std::path::PathBuf>,

    /// Seconds to wait for the todo binary before giving up.
    #[serde(default = "default_todo_timeout")]
    pub todo_timeout: u64,

    // OAuth providers. A provider with no client id is disabled.
    #[serde(default)]
    pub github_client_id: Option<String>,
    #[serde(default)]
    pub github_client_secret: Option<String>,
    #[serde(default)]
    pub gitlab_client_id: Option<String>,
    #[serde(default)]
    pub gitlab_client_secret: Option<String>,

    /// Repository (owner/name) that receives session QC issues.
    #[serde(default)]
    pub issue_repo: Option<String>,

    /// Webhook that relays incidental finding notifications to site staff.
    #[serde(default)]
    pub notify_webhook: Option<String>,

    /// User id granted dashboard admin on startup (idempotent).
    #[serde(default)]
    pub seed_admin_id: Option<i32>,
}
