use std::collections::HashMap;
use std::sync::Arc;

use repoforge_protocol::rpc::TargetRepoWire;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::notifier::{CommitStatusNotifier, NullNotifier};

/// The git hosting platform a source repo lives on, used to pick the right
/// commit-status API shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    GitLab,
    GitHub,
}

/// A source repository: where package definitions are cloned from and how
/// to push commit statuses back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub clone_url: String,
    pub platform: Platform,
    /// API identifier for the repo on its platform: a numeric project id on
    /// GitLab, an `owner/name` slug on GitHub.
    pub project_id: String,
}

/// Renders a [`TargetRepoWire`] into the shapes a builder container needs.
/// The registry holds target repos as the same wire DTO the coordinator
/// sends to builders, so this trait is the only thing the registry adds on
/// top of it rather than duplicating the struct.
pub trait TargetRepoRendering {
    /// Pacman-ini formatted concatenation of every extra repo:
    /// `[<name>]\nServer = <server>\n…` per entry, repos back to back.
    fn repo_to_string(&self) -> String;

    /// Space-joined keyring URLs, suitable for interpolation into a bash
    /// array literal.
    fn keyrings_to_bash_array(&self) -> String;
}

impl TargetRepoRendering for TargetRepoWire {
    fn repo_to_string(&self) -> String {
        let mut out = String::new();
        for repo in &self.extra_repos {
            out.push('[');
            out.push_str(&repo.name);
            out.push_str("]\n");
            for server in &repo.servers {
                out.push_str("Server = ");
                out.push_str(server);
                out.push('\n');
            }
        }
        out
    }

    fn keyrings_to_bash_array(&self) -> String {
        self.extra_keyrings.join(" ")
    }
}

/// Holds the source and target repo tables loaded from
/// `PACKAGE_REPOS`/`PACKAGE_TARGET_REPOS`, plus the per-source-repo
/// notifiers loaded from `PACKAGE_REPOS_NOTIFIERS`. A source repo with no
/// entry there gets a [`NullNotifier`] — notification is unconditional at
/// every call site, via the null-object pattern.
#[derive(Clone, Default)]
pub struct RepoRegistry {
    source_repos: Vec<RepoEntry>,
    target_repos: Vec<TargetRepoWire>,
    notifiers: HashMap<String, Arc<dyn CommitStatusNotifier>>,
}

impl RepoRegistry {
    pub fn new(
        source_repos: Vec<RepoEntry>,
        target_repos: Vec<TargetRepoWire>,
        notifiers: HashMap<String, Arc<dyn CommitStatusNotifier>>,
    ) -> Self {
        Self {
            source_repos,
            target_repos,
            notifiers,
        }
    }

    pub fn get_repo(&self, source_repo_name: &str) -> Result<&RepoEntry, RegistryError> {
        self.source_repos
            .iter()
            .find(|r| r.name == source_repo_name)
            .ok_or_else(|| RegistryError::NotFound(source_repo_name.to_string()))
    }

    pub fn get_target_repo(&self, name: &str) -> Result<&TargetRepoWire, RegistryError> {
        self.target_repos
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| RegistryError::TargetNotFound(name.to_string()))
    }

    /// The configured notifier for `source_repo_name`, or a silent
    /// [`NullNotifier`] if none was configured (or the repo itself is
    /// unknown — a missing registry entry should never block scheduling).
    pub fn notifier_for(&self, source_repo_name: &str) -> Arc<dyn CommitStatusNotifier> {
        self.notifiers
            .get(source_repo_name)
            .cloned()
            .unwrap_or_else(|| Arc::new(NullNotifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoforge_protocol::rpc::ExtraRepo;

    fn target() -> TargetRepoWire {
        TargetRepoWire {
            name: "chaotic-aur".to_string(),
            extra_repos: vec![ExtraRepo {
                name: "chaotic-aur".to_string(),
                servers: vec![
                    "https://mirror1.example/repo/$repo/$arch".to_string(),
                    "https://mirror2.example/repo/$repo/$arch".to_string(),
                ],
            }],
            extra_keyrings: vec![
                "https://mirror1.example/keyring.pkg".to_string(),
                "https://mirror2.example/keyring.pkg".to_string(),
            ],
        }
    }

    #[test]
    fn repo_to_string_formats_pacman_stanza() {
        let rendered = target().repo_to_string();
        assert_eq!(
            rendered,
            "[chaotic-aur]\nServer = https://mirror1.example/repo/$repo/$arch\nServer = https://mirror2.example/repo/$repo/$arch\n"
        );
    }

    #[test]
    fn keyrings_to_bash_array_space_joins() {
        assert_eq!(
            target().keyrings_to_bash_array(),
            "https://mirror1.example/keyring.pkg https://mirror2.example/keyring.pkg"
        );
    }

    #[test]
    fn get_repo_not_found() {
        let registry = RepoRegistry::default();
        assert!(matches!(
            registry.get_repo("missing"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn get_target_repo_not_found() {
        let registry = RepoRegistry::default();
        assert!(matches!(
            registry.get_target_repo("missing"),
            Err(RegistryError::TargetNotFound(_))
        ));
    }
}
