use async_trait::async_trait;
use repoforge_protocol::JobKey;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Commit-status states posted back to a source repo's platform, mirroring
/// the status vocabulary GitLab/GitHub pipelines expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyState {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

/// Posts a build's lifecycle as a commit status on its source repo. Every
/// source repo may have zero or one notifier configured; when absent, a
/// [`NullNotifier`] stands in so call sites never need an `Option` check.
#[async_trait]
pub trait CommitStatusNotifier: Send + Sync {
    async fn notify(
        &self,
        job: &JobKey,
        commit: Option<&str>,
        state: NotifyState,
        description: &str,
    ) -> Result<(), RegistryError>;
}

/// Null-object implementation: every notification silently succeeds. This is
/// the default for a source repo with no `PACKAGE_REPOS_NOTIFIERS` entry.
pub struct NullNotifier;

#[async_trait]
impl CommitStatusNotifier for NullNotifier {
    async fn notify(
        &self,
        _job: &JobKey,
        _commit: Option<&str>,
        _state: NotifyState,
        _description: &str,
    ) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// Outcome reported to a deployment notifier once a job's full build+deploy
/// pipeline has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentOutcome {
    Success,
    Failed,
    /// An unexpected error in the RPC layer itself, as opposed to a build
    /// that ran and failed on its own terms.
    SoftwareFailure,
}

/// Pushes a summary of a job's final outcome somewhere a human will see it.
/// Separate from [`CommitStatusNotifier`] because it isn't addressed per
/// source repo — one instance serves the whole coordinator.
#[async_trait]
pub trait DeploymentNotifier: Send + Sync {
    async fn notify_deployment(
        &self,
        job: &JobKey,
        outcome: DeploymentOutcome,
    ) -> Result<(), RegistryError>;
}

pub struct NullDeploymentNotifier;

#[async_trait]
impl DeploymentNotifier for NullDeploymentNotifier {
    async fn notify_deployment(
        &self,
        _job: &JobKey,
        _outcome: DeploymentOutcome,
    ) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// Pushes a one-line deployment summary to a Telegram chat via the Bot API.
/// Message formatting is intentionally minimal — the contract that matters
/// is that every completed job reaches `notify_deployment`.
pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    fn format_message(job: &JobKey, outcome: DeploymentOutcome) -> String {
        let verb = match outcome {
            DeploymentOutcome::Success => "deployed",
            DeploymentOutcome::Failed => "failed to deploy",
            DeploymentOutcome::SoftwareFailure => "hit an internal error deploying",
        };
        format!("{job} {verb}")
    }
}

#[async_trait]
impl DeploymentNotifier for TelegramNotifier {
    async fn notify_deployment(
        &self,
        job: &JobKey,
        outcome: DeploymentOutcome,
    ) -> Result<(), RegistryError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": Self::format_message(job, outcome),
        });
        self.http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| RegistryError::Notify(err.to_string()))?
            .error_for_status()
            .map_err(|err| RegistryError::Notify(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobKey {
        JobKey {
            target_repo: "chaotic-aur".to_string(),
            arch: "x86_64".to_string(),
            pkgbase: repoforge_protocol::PkgBase::try_from("my-pkg".to_string()).unwrap(),
        }
    }

    #[tokio::test]
    async fn null_notifier_always_succeeds() {
        let notifier = NullNotifier;
        notifier
            .notify(&job(), None, NotifyState::Running, "building")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn null_deployment_notifier_always_succeeds() {
        NullDeploymentNotifier
            .notify_deployment(&job(), DeploymentOutcome::Success)
            .await
            .unwrap();
    }

    #[test]
    fn telegram_message_mentions_job_and_outcome() {
        let msg = TelegramNotifier::format_message(&job(), DeploymentOutcome::Failed);
        assert!(msg.contains("chaotic-aur/x86_64/my-pkg"));
        assert!(msg.contains("failed to deploy"));
    }
}
