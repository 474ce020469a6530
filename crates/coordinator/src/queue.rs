use std::collections::BTreeMap;
use std::sync::Arc;

use repoforge_bus::BuildLog;
use repoforge_protocol::{JobKey, SavableJob};

/// A queued or running job plus the coordinator-only bookkeeping kept out
/// of the wire-facing `SavableJob`: who it's assigned to, what
/// replaces it if it gets superseded mid-build, and its log handle.
///
/// `replacement` is itself a `TrackedJob` (boxed, since the type is
/// recursive) rather than a bare `SavableJob`: a replacement needs its own
/// timestamp and its own bound `BuildLog` from the moment it's admitted,
/// not just at the point it finally gets swapped into `Q`.
pub struct TrackedJob {
    pub job: SavableJob,
    pub timestamp: i64,
    pub assigned_node: Option<String>,
    pub replacement: Option<Box<TrackedJob>>,
    pub log: Arc<BuildLog>,
}

impl TrackedJob {
    pub fn new(job: SavableJob, timestamp: i64, log: Arc<BuildLog>) -> Self {
        Self {
            job,
            timestamp,
            assigned_node: None,
            replacement: None,
            log,
        }
    }

    /// The savable projection of this slot: the newest pending replacement
    /// if one exists (walking to the end of the chain), else this job
    /// itself. In practice a job is replaced at most once before its slot
    /// is swapped, but the walk tolerates deeper chains.
    pub fn savable(&self) -> SavableJob {
        match &self.replacement {
            Some(next) => next.savable(),
            None => self.job.clone(),
        }
    }
}

/// The coordinator's single-writer state: the live queue and which builder
/// each in-flight job is running on. Both fields are mutated only while
/// holding the coordinator-global lock that wraps this struct.
#[derive(Default)]
pub struct CoordinatorState {
    pub q: BTreeMap<JobKey, TrackedJob>,
    pub busy_nodes: BTreeMap<String, JobKey>,
}

impl CoordinatorState {
    /// Savable projection of the current queue for persistence: a job with
    /// a pending replacement is saved as that replacement, so a restart
    /// resumes with the latest request rather than a build already
    /// superseded.
    pub fn savable_jobs(&self) -> Vec<SavableJob> {
        self.q.values().map(TrackedJob::savable).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoforge_bus::{Bus, FakeBus};
    use repoforge_protocol::{BuildClass, PkgBase};

    fn job(pkgbase: &str) -> SavableJob {
        SavableJob {
            pkgbase: PkgBase::try_from(pkgbase.to_string()).unwrap(),
            target_repo: "chaotic-aur".to_string(),
            source_repo: "chaotic-aur/packages".to_string(),
            arch: "x86_64".to_string(),
            build_class: BuildClass::small(),
            pkgnames: Default::default(),
            dependencies: Default::default(),
            commit: None,
        }
    }

    fn log() -> Arc<BuildLog> {
        let bus: Arc<dyn Bus> = Arc::new(FakeBus::new());
        Arc::new(BuildLog::new(bus, "pkg", 1))
    }

    #[test]
    fn savable_prefers_replacement_over_original() {
        let mut tracked = TrackedJob::new(job("foo"), 1000, log());
        tracked.replacement = Some(Box::new(TrackedJob::new(job("foo"), 2000, log())));
        assert_eq!(tracked.savable().target_repo, "chaotic-aur");
        assert_eq!(tracked.replacement.unwrap().timestamp, 2000);
    }

    #[test]
    fn savable_jobs_walks_replacement_chain_to_the_end() {
        let mut tracked = TrackedJob::new(job("foo"), 1000, log());
        let mut middle = TrackedJob::new(job("foo"), 2000, log());
        middle.replacement = Some(Box::new(TrackedJob::new(job("foo"), 3000, log())));
        tracked.replacement = Some(Box::new(middle));

        let mut state = CoordinatorState::default();
        state.q.insert(
            JobKey {
                target_repo: "chaotic-aur".to_string(),
                arch: "x86_64".to_string(),
                pkgbase: PkgBase::try_from("foo".to_string()).unwrap(),
            },
            tracked,
        );
        assert_eq!(state.savable_jobs(), vec![job("foo")]);
    }
}
