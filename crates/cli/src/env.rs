use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Parses one of the JSON-shaped environment inputs (`PACKAGE_REPOS`,
/// `PACKAGE_TARGET_REPOS`, `PACKAGE_REPOS_NOTIFIERS`).
/// These stay outside clap's own `value_parser` machinery (unlike the
/// scalar flags, which use `env = "..."`) because a `value_parser` runs
/// per-argument before `Args::parse` returns, and a JSON array doesn't fit
/// clap's single-value model as cleanly as a plain `serde_json::from_str`
/// call at the point of use.
pub fn parse_json<T: DeserializeOwned>(name: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).with_context(|| format!("invalid JSON in {name}"))
}
