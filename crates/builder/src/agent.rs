use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use repoforge_bus::{Bus, BuildLog};
use repoforge_database::DatabaseClient;
use repoforge_protocol::rpc::{AddToDbParams, BuildPackageParams, GenerateDestFillerFilesParams};
use repoforge_protocol::{BuildStatus, BuildStatusReturn};
use repoforge_registry::TargetRepoRendering;
use repoforge_runtime::{ContainerHandle, ContainerRuntime, ContainerSpec, LineSink};
use tokio::sync::Mutex;

use crate::config::BuilderConfig;
use crate::error::BuilderError;
use crate::upload::UploadClient;
use crate::{cache, pkgout};

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// One builder node's agent: at most one `BuildPackage` in flight at a time
/// (try-acquire mutex), with a cooperative `cancelled` flag and a handle
/// to whatever container is currently attached so
/// `CancelBuild` can force-remove it from another task.
pub struct BuilderAgent {
    runtime: Arc<dyn ContainerRuntime>,
    database: Arc<dyn DatabaseClient>,
    upload: Arc<dyn UploadClient>,
    bus: Arc<dyn Bus>,
    config: BuilderConfig,
    busy: Mutex<()>,
    cancelled: AtomicBool,
    current_container: Mutex<Option<ContainerHandle>>,
}

impl BuilderAgent {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        database: Arc<dyn DatabaseClient>,
        upload: Arc<dyn UploadClient>,
        bus: Arc<dyn Bus>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            runtime,
            database,
            upload,
            bus,
            config,
            busy: Mutex::new(()),
            cancelled: AtomicBool::new(false),
            current_container: Mutex::new(None),
        }
    }

    /// Runs the `BuildPackage` steps. Returns [`BuilderError::Busy`]
    /// immediately (never queues) if a build is already in progress —
    /// everything else is normalized into a [`BuildStatusReturn`], never
    /// propagated as an error.
    pub async fn build_package(
        &self,
        params: BuildPackageParams,
    ) -> Result<BuildStatusReturn, BuilderError> {
        let guard = self.busy.try_lock().map_err(|_| BuilderError::Busy)?;

        self.cancelled.store(false, Ordering::SeqCst);
        *self.current_container.lock().await = None;

        let result = self.run_build(&params).await;

        pkgout::clear(&self.config.pkgout_path()).await.ok();
        drop(guard);
        Ok(result)
    }

    async fn run_build(&self, params: &BuildPackageParams) -> BuildStatusReturn {
        let pkgbase = params.job.pkgbase.as_str().to_string();
        let log = Arc::new(BuildLog::new(self.bus.clone(), pkgbase.clone(), params.timestamp));
        log.append_line(&format!("Processing build job at {}", now_ms())).await.ok();

        if let Err(err) = pkgout::clear_and_recreate(&self.config.pkgout_path()).await {
            tracing::warn!(pkgbase = %pkgbase, error = %err, "failed to prepare pkgout");
            return BuildStatusReturn::new(BuildStatus::Failed);
        }

        let filler_files = match self
            .database
            .generate_dest_filler_files(GenerateDestFillerFilesParams {
                target_repo: params.job.target_repo.clone(),
                arch: params.job.arch.clone(),
            })
            .await
        {
            Ok(files) => files,
            Err(err) => {
                tracing::warn!(pkgbase = %pkgbase, error = %err, "failed to fetch repo_files");
                Vec::new()
            }
        };
        if let Err(err) = pkgout::create_filler_files(&self.config.pkgout_path(), &filler_files).await {
            tracing::warn!(pkgbase = %pkgbase, error = %err, "failed to write filler files");
        }

        let srcdest = self.config.srcdest_path(&params.job.target_repo);
        if let Err(err) = cache::sweep_source_cache(&srcdest, std::time::SystemTime::now()).await {
            tracing::warn!(pkgbase = %pkgbase, error = %err, "source cache sweep failed");
        }

        if self.cancelled.load(Ordering::SeqCst) {
            log.append_line("canceled before start").await.ok();
            return BuildStatusReturn::new(BuildStatus::Canceled);
        }

        let spec = ContainerSpec {
            image: self.config.builder_image.clone(),
            cmd: vec!["build".to_string(), pkgbase.clone()],
            binds: vec![
                format!("{}:/srcdest", srcdest.display()),
                format!("{}:/pkgout", self.config.pkgout_path().display()),
                format!("{}:/pkgbuilds", self.config.pkgbuilds_path.display()),
            ],
            env: vec![
                format!("BUILDER_HOSTNAME={}", self.config.hostname),
                format!("BUILDER_TIMEOUT={}", self.config.build_timeout_secs),
                format!("CI_CODE_SKIP={}", self.config.ci_code_skip),
                format!("EXTRA_PACMAN_REPOS={}", params.target_repo.repo_to_string()),
                format!("EXTRA_PACMAN_KEYRINGS={}", params.target_repo.keyrings_to_bash_array()),
                format!("PACKAGE_REPO_ID={}", params.job.target_repo),
                format!("PACKAGE_REPO_URL={}", package_repo_url(&params.target_repo)),
            ],
        };

        let handle = match self.runtime.create(&spec).await {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(pkgbase = %pkgbase, error = %err, "failed to create build container");
                return BuildStatusReturn::new(BuildStatus::Failed);
            }
        };
        *self.current_container.lock().await = Some(handle.clone());

        if self.cancelled.load(Ordering::SeqCst) {
            self.runtime.kill(&handle).await.ok();
            log.append_line("canceled before start").await.ok();
            return BuildStatusReturn::new(BuildStatus::Canceled);
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
        let log_for_drain = log.clone();
        let drain = tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                log_for_drain.append(&bytes).await.ok();
            }
        });
        let sink: LineSink = Arc::new(move |bytes: &[u8]| {
            let _ = tx.send(bytes.to_vec());
        });

        let status_code = match self.runtime.start(&handle, sink).await {
            Ok(code) => code,
            Err(err) => {
                tracing::warn!(pkgbase = %pkgbase, error = %err, "container start/wait failed");
                drain.abort();
                *self.current_container.lock().await = None;
                return BuildStatusReturn::new(BuildStatus::Failed);
            }
        };
        let _ = drain.await;
        *self.current_container.lock().await = None;

        if self.cancelled.load(Ordering::SeqCst) {
            log.append_line("canceled").await.ok();
            return BuildStatusReturn::new(BuildStatus::Canceled);
        }

        let real_files = pkgout::real_output_files(&self.config.pkgout_path())
            .await
            .unwrap_or_default();

        match classify_exit_code(status_code, &self.config, !real_files.is_empty()) {
            BuildStatus::Success => {
                self.finish_success(&pkgbase, params, &log, &real_files).await
            }
            other => BuildStatusReturn::new(other),
        }
    }

    async fn finish_success(
        &self,
        pkgbase: &str,
        params: &BuildPackageParams,
        log: &BuildLog,
        real_files: &[PathBuf],
    ) -> BuildStatusReturn {
        let filenames: Vec<String> = real_files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();

        let ssh = &params.upload_info.database.ssh;
        let landing_zone = &params.upload_info.database.landing_zone;
        if let Err(err) = self.upload.upload_dir(&self.config.pkgout_path(), ssh, landing_zone).await {
            tracing::warn!(pkgbase = %pkgbase, error = %err, "upload to landing zone failed");
            return BuildStatusReturn::new(BuildStatus::Failed);
        }

        let add_result = self
            .database
            .add_to_db(AddToDbParams {
                pkgbase: pkgbase.to_string(),
                target_repo: params.job.target_repo.clone(),
                source_repo: params.job.source_repo.clone(),
                arch: params.job.arch.clone(),
                pkgfiles: filenames.clone(),
                builder_image: self.config.builder_image.clone(),
                timestamp: params.timestamp,
            })
            .await;

        match add_result {
            Ok(result) if result.success => BuildStatusReturn::with_packages(BuildStatus::Success, filenames),
            Ok(_) => {
                log.append_line("add_to_db rejected the build").await.ok();
                BuildStatusReturn::new(BuildStatus::Failed)
            }
            Err(err) => {
                tracing::warn!(pkgbase = %pkgbase, error = %err, "add_to_db call failed");
                BuildStatusReturn::new(BuildStatus::Failed)
            }
        }
    }

    /// Idempotent: sets `cancelled`, force-removes whatever container is
    /// currently attached, then waits for the try-acquire mutex to become
    /// available so the caller knows the cancel was honored before queueing
    /// a replacement.
    pub async fn cancel_build(&self) {
        self.cancelled.store(true, Ordering::SeqCst);

        let handle = self.current_container.lock().await.clone();
        if let Some(handle) = handle {
            self.runtime.kill(&handle).await.ok();
        }

        let _guard = self.busy.lock().await;
    }
}

fn package_repo_url(target_repo: &repoforge_protocol::rpc::TargetRepoWire) -> String {
    target_repo
        .extra_repos
        .first()
        .and_then(|repo| repo.servers.first())
        .cloned()
        .unwrap_or_default()
}

/// Exit-code classification table. `has_output` distinguishes the two `0`
/// rows (real files produced vs. an ambiguous empty/`err` result).
fn classify_exit_code(status_code: i64, config: &BuilderConfig, has_output: bool) -> BuildStatus {
    match status_code {
        0 if has_output => BuildStatus::Success,
        0 => BuildStatus::Failed,
        13 => BuildStatus::AlreadyBuilt,
        code if code == config.ci_code_skip => BuildStatus::Skipped,
        124 => BuildStatus::TimedOut,
        _ => BuildStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoforge_bus::FakeBus;
    use repoforge_database::DatabaseError;
    use repoforge_protocol::rpc::{
        AutoRepoRemoveDbParams, DatabaseUploadInfo, ExtraRepo, FetchUploadInfoResult, SshInfo,
        SuccessResult, TargetRepoWire, UploadInfo,
    };
    use repoforge_protocol::{BuildClass, PkgBase, SavableJob};
    use repoforge_runtime::FakeRuntime;
    use std::sync::Mutex as StdMutex;

    use crate::upload::FakeUploadClient;

    struct StubDatabase {
        filler_files: Vec<String>,
        add_to_db_success: bool,
        add_to_db_calls: StdMutex<Vec<AddToDbParams>>,
    }

    #[async_trait::async_trait]
    impl DatabaseClient for StubDatabase {
        async fn fetch_upload_info(&self) -> Result<FetchUploadInfoResult, DatabaseError> {
            unimplemented!("not exercised by builder tests")
        }

        async fn add_to_db(&self, params: AddToDbParams) -> Result<SuccessResult, DatabaseError> {
            self.add_to_db_calls.lock().unwrap().push(params);
            Ok(SuccessResult {
                success: self.add_to_db_success,
            })
        }

        async fn generate_dest_filler_files(
            &self,
            _params: repoforge_protocol::rpc::GenerateDestFillerFilesParams,
        ) -> Result<Vec<String>, DatabaseError> {
            Ok(self.filler_files.clone())
        }

        async fn auto_repo_remove(
            &self,
            _params: AutoRepoRemoveDbParams,
        ) -> Result<SuccessResult, DatabaseError> {
            unimplemented!("not exercised by builder tests")
        }
    }

    fn config(shared: &std::path::Path) -> BuilderConfig {
        BuilderConfig {
            hostname: "builder-1".to_string(),
            builder_image: "registry.example/builder:latest".to_string(),
            build_timeout_secs: 3600,
            ci_code_skip: 123,
            shared_path: shared.to_path_buf(),
            pkgbuilds_path: shared.join("pkgbuilds"),
        }
    }

    fn params() -> BuildPackageParams {
        BuildPackageParams {
            job: SavableJob {
                pkgbase: PkgBase::try_from("foo".to_string()).unwrap(),
                target_repo: "chaotic-aur".to_string(),
                source_repo: "chaotic-aur/packages".to_string(),
                arch: "x86_64".to_string(),
                build_class: BuildClass::small(),
                pkgnames: Default::default(),
                dependencies: Default::default(),
                commit: None,
            },
            timestamp: 1000,
            target_repo: TargetRepoWire {
                name: "chaotic-aur".to_string(),
                extra_repos: vec![ExtraRepo {
                    name: "chaotic-aur".to_string(),
                    servers: vec!["https://mirror.example/repo".to_string()],
                }],
                extra_keyrings: vec![],
            },
            upload_info: UploadInfo {
                database: DatabaseUploadInfo {
                    ssh: SshInfo {
                        host: "db.example".to_string(),
                        port: 22,
                        user: "builder".to_string(),
                    },
                    landing_zone: "/landing".to_string(),
                },
            },
        }
    }

    fn agent(
        tmp: &std::path::Path,
        database: Arc<dyn DatabaseClient>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> BuilderAgent {
        BuilderAgent::new(
            runtime,
            database,
            Arc::new(FakeUploadClient::new()),
            Arc::new(FakeBus::new()),
            config(tmp),
        )
    }

    #[tokio::test]
    async fn zero_exit_with_no_real_output_is_failed() {
        // The fake runtime only replays console output, not filesystem
        // writes, so a `0` exit with nothing in pkgout exercises the
        // ambiguous "exit 0 but nothing to ship" row of the classification
        // table rather than the happy path.
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_exit_code(0);
        runtime.set_output(b"building...\n".to_vec());

        let database = Arc::new(StubDatabase {
            filler_files: vec!["already-there.pkg.tar.zst".to_string()],
            add_to_db_success: true,
            add_to_db_calls: StdMutex::new(Vec::new()),
        });

        let agent = agent(tmp.path(), database, runtime);
        let result = agent.build_package(params()).await.unwrap();
        assert_eq!(result.success, BuildStatus::Failed);
    }

    #[tokio::test]
    async fn exit_13_is_already_built() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_exit_code(13);
        let database = Arc::new(StubDatabase {
            filler_files: vec![],
            add_to_db_success: true,
            add_to_db_calls: StdMutex::new(Vec::new()),
        });
        let agent = agent(tmp.path(), database, runtime);
        let result = agent.build_package(params()).await.unwrap();
        assert_eq!(result.success, BuildStatus::AlreadyBuilt);
    }

    #[tokio::test]
    async fn configured_ci_skip_code_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_exit_code(123);
        let database = Arc::new(StubDatabase {
            filler_files: vec![],
            add_to_db_success: true,
            add_to_db_calls: StdMutex::new(Vec::new()),
        });
        let agent = agent(tmp.path(), database, runtime);
        let result = agent.build_package(params()).await.unwrap();
        assert_eq!(result.success, BuildStatus::Skipped);
    }

    #[tokio::test]
    async fn exit_124_is_timed_out() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_exit_code(124);
        let database = Arc::new(StubDatabase {
            filler_files: vec![],
            add_to_db_success: true,
            add_to_db_calls: StdMutex::new(Vec::new()),
        });
        let agent = agent(tmp.path(), database, runtime);
        let result = agent.build_package(params()).await.unwrap();
        assert_eq!(result.success, BuildStatus::TimedOut);
    }

    #[tokio::test]
    async fn other_nonzero_exit_is_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_exit_code(2);
        let database = Arc::new(StubDatabase {
            filler_files: vec![],
            add_to_db_success: true,
            add_to_db_calls: StdMutex::new(Vec::new()),
        });
        let agent = agent(tmp.path(), database, runtime);
        let result = agent.build_package(params()).await.unwrap();
        assert_eq!(result.success, BuildStatus::Failed);
    }

    struct WritesFileRuntime {
        pkgout: PathBuf,
    }

    #[async_trait::async_trait]
    impl ContainerRuntime for WritesFileRuntime {
        async fn pull_image(&self, _name: &str) -> Result<(), repoforge_runtime::RuntimeError> {
            Ok(())
        }

        async fn get_image(&self, name: &str) -> Result<String, repoforge_runtime::RuntimeError> {
            Ok(name.to_string())
        }

        async fn create(&self, _spec: &ContainerSpec) -> Result<ContainerHandle, repoforge_runtime::RuntimeError> {
            Ok(ContainerHandle {
                id: "writes-file".to_string(),
            })
        }

        async fn start(
            &self,
            _handle: &ContainerHandle,
            line_sink: LineSink,
        ) -> Result<i64, repoforge_runtime::RuntimeError> {
            line_sink(b"built foo-1.0-1-x86_64.pkg.tar.zst\n");
            tokio::fs::write(self.pkgout.join("foo-1.0-1-x86_64.pkg.tar.zst"), b"pkgdata")
                .await
                .unwrap();
            Ok(0)
        }

        async fn kill(&self, _handle: &ContainerHandle) -> Result<(), repoforge_runtime::RuntimeError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn successful_build_uploads_and_adds_to_db() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let runtime = Arc::new(WritesFileRuntime {
            pkgout: cfg.pkgout_path(),
        });
        let database = Arc::new(StubDatabase {
            filler_files: vec![],
            add_to_db_success: true,
            add_to_db_calls: StdMutex::new(Vec::new()),
        });
        let upload = Arc::new(FakeUploadClient::new());

        let agent = BuilderAgent::new(
            runtime,
            database.clone(),
            upload.clone(),
            Arc::new(FakeBus::new()),
            cfg,
        );

        let result = agent.build_package(params()).await.unwrap();
        assert_eq!(result.success, BuildStatus::Success);
        assert_eq!(
            result.packages,
            Some(vec!["foo-1.0-1-x86_64.pkg.tar.zst".to_string()])
        );
        assert_eq!(upload.calls(), vec!["builder@db.example:/landing".to_string()]);
        assert_eq!(database.add_to_db_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_build_package_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        let database = Arc::new(StubDatabase {
            filler_files: vec![],
            add_to_db_success: true,
            add_to_db_calls: StdMutex::new(Vec::new()),
        });
        let agent = Arc::new(agent(tmp.path(), database, runtime));

        let held = agent.busy.try_lock().unwrap();
        let result = agent.build_package(params()).await;
        assert!(matches!(result, Err(BuilderError::Busy)));
        drop(held);
    }

    #[tokio::test]
    async fn cancel_before_start_short_circuits_to_canceled() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        let database = Arc::new(StubDatabase {
            filler_files: vec![],
            add_to_db_success: true,
            add_to_db_calls: StdMutex::new(Vec::new()),
        });
        let agent = agent(tmp.path(), database, runtime);
        agent.cancelled.store(true, Ordering::SeqCst);

        let result = agent.build_package(params()).await.unwrap();
        assert_eq!(result.success, BuildStatus::Canceled);
    }
}
