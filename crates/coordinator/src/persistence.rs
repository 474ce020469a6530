use std::time::Duration;

use repoforge_bus::Bus;
use repoforge_protocol::{SavableJob, SavedQueue};

use crate::error::CoordinatorError;

const QUEUE_KEY: &str = "build-queue";

/// `build-queue` is meant to survive indefinitely across restarts; `set_ex`
/// requires a TTL, so it's set deliberately long rather than left to expire.
const QUEUE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub async fn save_queue(bus: &dyn Bus, jobs: Vec<SavableJob>, version: u32) -> Result<(), CoordinatorError> {
    let saved = SavedQueue {
        save_queue: jobs,
        version,
    };
    let bytes = serde_json::to_vec(&saved)?;
    bus.set_ex(QUEUE_KEY, &bytes, QUEUE_TTL).await?;
    Ok(())
}

/// Load the persisted queue, discarding it if its `version` doesn't match
/// `expected_version` (a coordinator upgrade that changes wire shape should
/// never rehydrate stale data).
pub async fn load_queue(bus: &dyn Bus, expected_version: u32) -> Result<Vec<SavableJob>, CoordinatorError> {
    match bus.get(QUEUE_KEY).await? {
        Some(bytes) => {
            let saved: SavedQueue = serde_json::from_slice(&bytes)?;
            if saved.version == expected_version {
                Ok(saved.save_queue)
            } else {
                tracing::warn!(
                    found = saved.version,
                    expected = expected_version,
                    "discarding build-queue snapshot with mismatched version"
                );
                Ok(Vec::new())
            }
        }
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoforge_bus::FakeBus;
    use repoforge_protocol::{BuildClass, PkgBase};

    fn job() -> SavableJob {
        SavableJob {
            pkgbase: PkgBase::try_from("my-pkg".to_string()).unwrap(),
            target_repo: "chaotic-aur".to_string(),
            source_repo: "chaotic-aur/packages".to_string(),
            arch: "x86_64".to_string(),
            build_class: BuildClass::small(),
            pkgnames: Default::default(),
            dependencies: Default::default(),
            commit: None,
        }
    }

    #[tokio::test]
    async fn round_trips_with_matching_version() {
        let bus = FakeBus::new();
        save_queue(&bus, vec![job()], 3).await.unwrap();
        let loaded = load_queue(&bus, 3).await.unwrap();
        assert_eq!(loaded, vec![job()]);
    }

    #[tokio::test]
    async fn mismatched_version_discards_snapshot() {
        let bus = FakeBus::new();
        save_queue(&bus, vec![job()], 3).await.unwrap();
        let loaded = load_queue(&bus, 4).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn missing_snapshot_is_empty() {
        let bus = FakeBus::new();
        let loaded = load_queue(&bus, 1).await.unwrap();
        assert!(loaded.is_empty());
    }
}
