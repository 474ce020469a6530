use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// `repoforge`: the coordinator, builder agent, database shim and log/queue
/// web endpoint, selected by subcommand. Scalar configuration is read via
/// clap's `env = "..."` attribute; the three JSON-shaped inputs are parsed
/// by hand in each verb's `run`.
#[derive(Debug, Parser)]
#[command(name = "repoforge", version, about = "Distributed Arch package build orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the coordinator: job admission, scheduling, persistence.
    Schedule(ScheduleArgs),
    /// Run the per-node builder agent.
    Builder(BuilderArgs),
    /// Run the database RPC shim backing `add`/`filler-files`/`remove`.
    Database(DatabaseArgs),
    /// Run the log HTTP endpoint and queue/stats routes.
    Web(WebArgs),
    /// One-shot: ask the running coordinator to remove packages from a repo.
    AutoRepoRemove(AutoRepoRemoveArgs),
}

#[derive(Debug, Args)]
pub struct RedisArgs {
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    pub redis_host: String,
    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    pub redis_port: u16,
    #[arg(long, env = "REDIS_PASSWORD")]
    pub redis_password: Option<String>,
}

impl RedisArgs {
    pub fn url(&self) -> String {
        match &self.redis_password {
            Some(password) if !password.is_empty() => {
                format!("redis://:{password}@{}:{}", self.redis_host, self.redis_port)
            }
            _ => format!("redis://{}:{}", self.redis_host, self.redis_port),
        }
    }
}

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub redis: RedisArgs,

    #[arg(long, env = "BUILDER_IMAGE")]
    pub builder_image: String,

    #[arg(long, env = "LOGS_URL")]
    pub logs_url: Option<String>,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN")]
    pub telegram_bot_token: Option<String>,
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,

    /// JSON array of `RepoEntry`.
    #[arg(long, env = "PACKAGE_REPOS", default_value = "[]")]
    pub package_repos: String,
    /// JSON array of `TargetRepoWire`.
    #[arg(long, env = "PACKAGE_TARGET_REPOS", default_value = "[]")]
    pub package_target_repos: String,
    /// JSON array of source repo names with a configured commit-status
    /// notifier.
    #[arg(long, env = "PACKAGE_REPOS_NOTIFIERS", default_value = "[]")]
    pub package_repos_notifiers: String,
}

#[derive(Debug, Args)]
pub struct BuilderArgs {
    #[command(flatten)]
    pub redis: RedisArgs,

    #[arg(long, env = "BUILDER_HOSTNAME")]
    pub builder_hostname: String,
    #[arg(long, env = "BUILDER_IMAGE")]
    pub builder_image: String,
    #[arg(long, env = "BUILDER_TIMEOUT", default_value_t = 3600)]
    pub builder_timeout: u64,
    #[arg(long, env = "BUILDER_CLASS", default_value_t = 0)]
    pub builder_class: u8,
    #[arg(long, env = "CI_CODE_SKIP", default_value_t = 123)]
    pub ci_code_skip: i64,
    #[arg(long, env = "CONTAINER_ENGINE", default_value = "docker")]
    pub container_engine: String,
    #[arg(long, env = "SHARED_PATH")]
    pub shared_path: PathBuf,
    #[arg(long, env = "REPO_PATH")]
    pub repo_path: PathBuf,
    #[arg(long, env = "SSH_IDENTITY_FILE")]
    pub ssh_identity_file: Option<String>,
}

#[derive(Debug, Args)]
pub struct DatabaseArgs {
    #[command(flatten)]
    pub redis: RedisArgs,

    #[arg(long, env = "BUILDER_IMAGE")]
    pub builder_image: String,
    #[arg(long, env = "REPO_PATH")]
    pub repo_path: String,
    #[arg(long, env = "GPG_PATH")]
    pub gpg_path: String,
    #[arg(long, env = "DATABASE_HOST")]
    pub database_host: String,
    #[arg(long, env = "DATABASE_PORT", default_value_t = 22)]
    pub database_port: u16,
    #[arg(long, env = "DATABASE_USER")]
    pub database_user: String,
    #[arg(long, env = "LANDING_ZONE_PATH")]
    pub landing_zone_path: String,
    #[arg(long, env = "CONTAINER_ENGINE", default_value = "docker")]
    pub container_engine: String,
}

#[derive(Debug, Args)]
pub struct WebArgs {
    #[command(flatten)]
    pub redis: RedisArgs,

    #[arg(long, env = "WEB_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub web_bind_addr: SocketAddr,
    #[arg(long, env = "WEB_STATIC_DIR")]
    pub web_static_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AutoRepoRemoveArgs {
    #[command(flatten)]
    pub redis: RedisArgs,

    #[arg(long)]
    pub repo: String,
    #[arg(long)]
    pub arch: String,
    /// May be repeated: `--pkgbase foo --pkgbase bar`.
    #[arg(long = "pkgbase", required = true)]
    pub pkgbases: Vec<String>,
}
