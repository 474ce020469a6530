use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use repoforge_bus::{Bus, BuildLog};
use repoforge_database::DatabaseClient;
use repoforge_protocol::rpc::{
    AddJobsToQueueParams, AutoRepoRemoveDbParams, AutoRepoRemoveParams, BrokerNode,
    BuildPackageParams, QueueEntryStatus, QueueStatusEntry, TargetRepoWire, UploadInfo,
};
use repoforge_protocol::{BuildStatus, BuildStatusReturn, JobKey, PkgBase, SavableJob};
use repoforge_registry::{CommitStatusNotifier, DeploymentNotifier, DeploymentOutcome, NotifyState, RepoRegistry};
use tokio::sync::{Mutex, Notify};

use crate::builder_rpc::BuilderRpc;
use crate::error::CoordinatorError;
use crate::graph::{GraphJob, JobGraph};
use crate::metrics;
use crate::nodes::NodePresence;
use crate::persistence;
use crate::queue::{CoordinatorState, TrackedJob};

/// Upper bound on how long shutdown waits for in-flight builds to drain
/// before giving up and exiting anyway.
const MAX_SHUTDOWN_TIME: Duration = Duration::from_secs(30);

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Central scheduler: accepts submissions, builds a dependency graph,
/// dispatches to available builders and applies completion policy. `Q` and
/// `BusyNodes` live inside `state`, mutated only under its lock, which
/// serializes every state transition through one coordinator-global mutex.
pub struct Coordinator {
    state: Mutex<CoordinatorState>,
    active: AtomicBool,
    drained: Notify,
    version: u32,
    bus: Arc<dyn Bus>,
    registry: Arc<RepoRegistry>,
    nodes: Arc<dyn NodePresence>,
    database: Arc<dyn DatabaseClient>,
    deployment_notifier: Arc<dyn DeploymentNotifier>,
    builder_rpc: BuilderRpc,
    logs_url: Option<String>,
    /// `BUILDER_IMAGE`: threaded through to `database.AutoRepoRemove`, which
    /// needs it to locate the right repo-add binary for the target arch.
    builder_image: String,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: Arc<dyn Bus>,
        registry: Arc<RepoRegistry>,
        nodes: Arc<dyn NodePresence>,
        database: Arc<dyn DatabaseClient>,
        deployment_notifier: Arc<dyn DeploymentNotifier>,
        version: u32,
        logs_url: Option<String>,
        builder_image: String,
    ) -> Self {
        Self {
            state: Mutex::new(CoordinatorState::default()),
            active: AtomicBool::new(false),
            drained: Notify::new(),
            version,
            builder_rpc: BuilderRpc::new(bus.clone()),
            bus,
            registry,
            nodes,
            database,
            deployment_notifier,
            logs_url,
            builder_image,
        }
    }

    fn notifier_for(&self, source_repo: &str) -> Arc<dyn CommitStatusNotifier> {
        self.registry.notifier_for(source_repo)
    }

    fn target_repo_wire(&self, name: &str) -> TargetRepoWire {
        match self.registry.get_target_repo(name) {
            Ok(entry) => entry.clone(),
            Err(_) => {
                tracing::warn!(target_repo = name, "no registered target repo; using empty extras");
                TargetRepoWire {
                    name: name.to_string(),
                    extra_repos: Vec::new(),
                    extra_keyrings: Vec::new(),
                }
            }
        }
    }

    /// Rehydrate `Q` from the persisted snapshot, mark the coordinator
    /// active and run an initial `AssignJobs`. Each restored job gets a
    /// fresh timestamp, a "Restored job …" log line, and a fresh default
    /// pointer.
    pub async fn restore(self: &Arc<Self>) -> Result<(), CoordinatorError> {
        let saved = persistence::load_queue(&*self.bus, self.version).await?;
        let mut state = self.state.lock().await;
        for job in saved {
            let timestamp = now_ms();
            let log = Arc::new(BuildLog::new(self.bus.clone(), job.pkgbase.as_str().to_string(), timestamp));
            log.append_line(&format!("Restored job at {timestamp}")).await.ok();
            log.set_default().await.ok();
            state.q.insert(job.key(), TrackedJob::new(job, timestamp, log));
        }
        drop(state);

        self.active.store(true, Ordering::SeqCst);
        self.assign_jobs().await;
        Ok(())
    }

    /// Validates the batch itself (empty fields/packages is
    /// `InvalidArgument`); per-package validation failures are logged and
    /// skipped rather than failing the whole call.
    pub async fn add_jobs_to_queue(self: &Arc<Self>, params: AddJobsToQueueParams) -> Result<(), CoordinatorError> {
        if params.target_repo.is_empty() || params.source_repo.is_empty() || params.arch.is_empty() {
            return Err(CoordinatorError::InvalidArgument(
                "target_repo, source_repo and arch are required".to_string(),
            ));
        }
        if params.packages.is_empty() {
            return Err(CoordinatorError::InvalidArgument("packages must not be empty".to_string()));
        }

        let timestamp = now_ms();
        let notifier = self.notifier_for(&params.source_repo);

        {
            let mut state = self.state.lock().await;
            for package in &params.packages {
                let pkgbase = match PkgBase::try_from(package.pkgbase.clone()) {
                    Ok(pkgbase) => pkgbase,
                    Err(err) => {
                        tracing::warn!(pkgbase = %package.pkgbase, error = %err, "skipping invalid pkgbase");
                        continue;
                    }
                };

                let job = SavableJob {
                    pkgbase,
                    target_repo: params.target_repo.clone(),
                    source_repo: params.source_repo.clone(),
                    arch: params.arch.clone(),
                    build_class: package.build_class.clone(),
                    pkgnames: package.pkgnames.iter().cloned().collect(),
                    dependencies: package.dependencies.iter().cloned().collect(),
                    commit: params.commit.clone(),
                };
                let key = job.key();
                let log = Arc::new(BuildLog::new(self.bus.clone(), job.pkgbase.as_str().to_string(), timestamp));

                if let Some(existing) = state.q.get_mut(&key) {
                    if let Some(node_id) = existing.assigned_node.clone() {
                        let builder_rpc = self.builder_rpc.clone();
                        tokio::spawn(async move {
                            builder_rpc.cancel_build(&node_id).await;
                        });
                        existing
                            .log
                            .append_line("cancellation requested, replacement enqueued")
                            .await
                            .ok();
                        existing.replacement = Some(Box::new(TrackedJob::new(job.clone(), timestamp, log.clone())));
                    } else {
                        existing.log.append_line("canceled and replaced before execution").await.ok();
                        existing.log.end_log().await.ok();
                        notifier
                            .notify(&key, existing.job.commit.as_deref(), NotifyState::Canceled, "canceled and replaced before execution")
                            .await
                            .ok();
                        *existing = TrackedJob::new(job.clone(), timestamp, log.clone());
                    }
                } else {
                    state.q.insert(key.clone(), TrackedJob::new(job.clone(), timestamp, log.clone()));
                }

                log.append_line(&format!("Added to build queue at {timestamp}")).await.ok();
                log.set_default().await.ok();
                notifier.notify(&key, job.commit.as_deref(), NotifyState::Pending, "pending").await.ok();
            }
        }

        self.assign_jobs().await;
        Ok(())
    }

    pub async fn auto_repo_remove(&self, params: AutoRepoRemoveParams) -> Result<(), CoordinatorError> {
        let result = self
            .database
            .auto_repo_remove(AutoRepoRemoveDbParams {
                pkgbases: params.pkgbases,
                arch: params.arch,
                repo: params.repo,
                builder_image: self.builder_image.clone(),
            })
            .await
            .map_err(|err| CoordinatorError::Upstream(err.to_string()))?;

        if !result.success {
            return Err(CoordinatorError::Upstream("auto_repo_remove rejected by database".to_string()));
        }
        Ok(())
    }

    pub async fn job_exists(&self, pkgbase: &str, timestamp: i64) -> bool {
        let state = self.state.lock().await;
        state
            .q
            .values()
            .any(|tracked| tracked.job.pkgbase.as_str() == pkgbase && tracked.timestamp == timestamp)
    }

    pub async fn get_queue(&self) -> Vec<QueueStatusEntry> {
        let state = self.state.lock().await;
        state
            .q
            .values()
            .map(|tracked| QueueStatusEntry {
                status: if tracked.assigned_node.is_some() {
                    QueueEntryStatus::Active
                } else {
                    QueueEntryStatus::Queued
                },
                node: tracked.assigned_node.clone(),
                build_class: tracked.job.build_class.clone(),
                job_data: tracked.job.clone(),
                timestamp: tracked.timestamp,
                live_log_url: self
                    .logs_url
                    .as_ref()
                    .map(|base| format!("{base}/api/logs/{}/{}", tracked.job.pkgbase, tracked.timestamp)),
            })
            .collect()
    }

    pub async fn get_available_nodes(&self) -> Vec<BrokerNode> {
        let state = self.state.lock().await;
        self.nodes
            .available_nodes()
            .await
            .into_iter()
            .filter(|node| {
                node.service == "builder"
                    && node.present
                    && node.version == self.version
                    && !state.busy_nodes.contains_key(&node.id)
            })
            .collect()
    }

    /// Core scheduling pass. Serialized by `state`'s lock; no-ops if the
    /// coordinator isn't active (start-of-restore or mid-shutdown).
    pub async fn assign_jobs(self: &Arc<Self>) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }

        let mut state = self.state.lock().await;

        let available: Vec<BrokerNode> = self
            .nodes
            .available_nodes()
            .await
            .into_iter()
            .filter(|node| {
                node.service == "builder"
                    && node.present
                    && node.version == self.version
                    && !state.busy_nodes.contains_key(&node.id)
            })
            .collect();
        if available.is_empty() {
            return;
        }

        let graph_jobs: Vec<GraphJob> = state
            .q
            .iter()
            .map(|(key, tracked)| GraphJob {
                key: key.clone(),
                pkgnames: tracked.job.pkgnames.iter().cloned().collect(),
                dependencies: tracked.job.dependencies.iter().cloned().collect(),
                build_class: tracked.job.build_class.clone(),
                assigned: tracked.assigned_node.is_some(),
            })
            .collect();
        let graph = JobGraph::build(graph_jobs);

        let upload_info = match self.database.fetch_upload_info().await {
            Ok(info) => UploadInfo { database: info.database },
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch upload info; skipping assignment cycle");
                return;
            }
        };

        for node in &available {
            let possible = graph.possible_jobs(node.build_class, &node.pure_name);
            let Some(key) = possible.into_iter().next() else {
                continue;
            };
            let Some(tracked) = state.q.get_mut(&key) else {
                continue;
            };
            if tracked.assigned_node.is_some() {
                continue;
            }

            tracked.assigned_node = Some(node.id.clone());
            state.busy_nodes.insert(node.id.clone(), key.clone());

            let tracked = &state.q[&key];
            let job = tracked.job.clone();
            let timestamp = tracked.timestamp;
            let log = tracked.log.clone();

            log.append_line("running").await.ok();
            self.notifier_for(&job.source_repo)
                .notify(&key, job.commit.as_deref(), NotifyState::Running, "running")
                .await
                .ok();

            let params = BuildPackageParams {
                job: job.clone(),
                timestamp,
                target_repo: self.target_repo_wire(&job.target_repo),
                upload_info: upload_info.clone(),
            };

            let coordinator = Arc::clone(self);
            let node_id = node.id.clone();
            let key_for_task = key.clone();
            tokio::spawn(async move {
                let result = coordinator.builder_rpc.build_package(&node_id, &params).await;
                coordinator.on_build_complete(node_id, key_for_task, result).await;
            });
        }

        let savable = state.savable_jobs();
        let queue_depth = state.q.len();
        let busy = state.busy_nodes.len();
        drop(state);

        if let Err(err) = persistence::save_queue(&*self.bus, savable, self.version).await {
            tracing::warn!(error = %err, "failed to persist build queue");
        }
        metrics::set_queue_gauges(queue_depth, busy);
    }

    /// Completion handler: always runs finally-style (notify, end log,
    /// requeue-or-remove, release slot, reassign) regardless of which
    /// completion-status branch applied.
    async fn on_build_complete(
        self: &Arc<Self>,
        node_id: String,
        key: JobKey,
        result: Result<BuildStatusReturn, CoordinatorError>,
    ) {
        let shutting_down = !self.active.load(Ordering::SeqCst);

        let (log, now_drained) = {
            let mut state = self.state.lock().await;
            let Some(tracked) = state.q.get_mut(&key) else {
                tracing::warn!(job = %key, "completion for job no longer in queue");
                return;
            };

            let (status, packages) = match result {
                Ok(ret) => (ret.success, ret.packages.unwrap_or_default()),
                Err(err) => {
                    tracing::warn!(job = %key, error = %err, "builder rpc returned an unexpected error");
                    metrics::record_rpc_error();
                    self.notifier_for(&tracked.job.source_repo)
                        .notify(&key, tracked.job.commit.as_deref(), NotifyState::Failed, "failed")
                        .await
                        .ok();
                    self.deployment_notifier
                        .notify_deployment(&key, DeploymentOutcome::SoftwareFailure)
                        .await
                        .ok();
                    tracked.log.append_line("failed").await.ok();
                    (BuildStatus::SoftwareFailure, Vec::new())
                }
            };

            // A builder that only ever returns `Canceled` during shutdown is
            // treated as requeue-worthy, same as an explicit `CanceledRequeue`.
            let effective_status = if shutting_down && status == BuildStatus::Canceled {
                BuildStatus::CanceledRequeue
            } else {
                status
            };

            if effective_status != BuildStatus::SoftwareFailure {
                self.apply_completion_policy(tracked, &key, effective_status, packages).await;
            }

            let log = tracked.log.clone();
            let replacement = tracked.replacement.take();

            if let Some(replacement) = replacement {
                state.q.insert(key.clone(), *replacement);
            } else {
                state.q.remove(&key);
            }
            state.busy_nodes.remove(&node_id);

            (log, state.busy_nodes.is_empty())
        };

        log.end_log().await.ok();

        if now_drained {
            self.drained.notify_waiters();
        }

        self.assign_jobs().await;
    }

    /// Applies one row of the completion-status table: commit-status, log
    /// line, deployment notification and metric.
    async fn apply_completion_policy(
        &self,
        tracked: &mut TrackedJob,
        key: &JobKey,
        status: BuildStatus,
        packages: Vec<String>,
    ) {
        let notifier = self.notifier_for(&tracked.job.source_repo);
        let commit = tracked.job.commit.clone();
        let has_replacement = tracked.replacement.is_some();

        match status {
            BuildStatus::Success => {
                notifier.notify(key, commit.as_deref(), NotifyState::Success, "success").await.ok();
                tracked.log.append_line("finished at ".to_string() + &now_ms().to_string()).await.ok();
                self.deployment_notifier
                    .notify_deployment(key, DeploymentOutcome::Success)
                    .await
                    .ok();
                metrics::record_completion(status, false);
                let _ = packages;
            }
            BuildStatus::AlreadyBuilt => {
                notifier.notify(key, commit.as_deref(), NotifyState::Canceled, "canceled").await.ok();
                tracked.log.append_line("skipped — already built").await.ok();
                metrics::record_completion(status, false);
            }
            BuildStatus::Skipped => {
                notifier.notify(key, commit.as_deref(), NotifyState::Canceled, "canceled").await.ok();
                tracked.log.append_line("skipped via build tools").await.ok();
                metrics::record_completion(status, false);
            }
            BuildStatus::Failed => {
                notifier.notify(key, commit.as_deref(), NotifyState::Failed, "failed").await.ok();
                tracked.log.append_line("failed").await.ok();
                self.deployment_notifier
                    .notify_deployment(key, DeploymentOutcome::Failed)
                    .await
                    .ok();
                metrics::record_completion(status, false);
            }
            BuildStatus::TimedOut => {
                notifier.notify(key, commit.as_deref(), NotifyState::Failed, "failed").await.ok();
                tracked.log.append_line("timeout during build").await.ok();
                self.deployment_notifier
                    .notify_deployment(key, DeploymentOutcome::Failed)
                    .await
                    .ok();
                metrics::record_completion(status, false);
            }
            BuildStatus::Canceled => {
                notifier.notify(key, commit.as_deref(), NotifyState::Canceled, "canceled").await.ok();
                if has_replacement {
                    tracked.log.append_line("canceled and replaced").await.ok();
                } else {
                    tracked.log.append_line("canceled").await.ok();
                }
                metrics::record_completion(status, has_replacement);
            }
            BuildStatus::CanceledRequeue => {
                notifier.notify(key, commit.as_deref(), NotifyState::Canceled, "canceled").await.ok();
                tracked.log.append_line("canceled and re-queued").await.ok();
                if tracked.replacement.is_none() {
                    let log = Arc::new(BuildLog::new(self.bus.clone(), tracked.job.pkgbase.as_str().to_string(), tracked.timestamp));
                    tracked.replacement = Some(Box::new(TrackedJob::new(tracked.job.clone(), tracked.timestamp, log)));
                }
                metrics::record_completion(status, true);
            }
            BuildStatus::SoftwareFailure => unreachable!("handled by caller before entering policy"),
        }
    }

    /// Block new dispatch, persist, cancel every assigned job (clearing any
    /// pending replacement to avoid a requeue-chain loop), then wait
    /// (bounded) for `BusyNodes` to drain.
    pub async fn shutdown(self: &Arc<Self>) {
        self.active.store(false, Ordering::SeqCst);

        let (savable, still_busy) = {
            let mut state = self.state.lock().await;
            let savable = state.savable_jobs();

            for tracked in state.q.values_mut() {
                if let Some(node_id) = tracked.assigned_node.clone() {
                    let builder_rpc = self.builder_rpc.clone();
                    tokio::spawn(async move {
                        builder_rpc.cancel_build(&node_id).await;
                    });
                    tracked.log.append_line("canceled for shutdown").await.ok();
                    tracked.replacement = None;
                }
            }

            (savable, !state.busy_nodes.is_empty())
        };

        if let Err(err) = persistence::save_queue(&*self.bus, savable, self.version).await {
            tracing::warn!(error = %err, "failed to persist build queue during shutdown");
        }

        if still_busy {
            if tokio::time::timeout(MAX_SHUTDOWN_TIME, self.drained.notified()).await.is_err() {
                tracing::warn!("forced shutdown: builders did not drain within the shutdown window");
            }
        }
    }
}
