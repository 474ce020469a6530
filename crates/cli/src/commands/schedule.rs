use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use repoforge_bus::{Bus, RedisBus};
use repoforge_coordinator::{BusNodePresence, Coordinator};
use repoforge_database::BusDatabaseClient;
use repoforge_protocol::rpc::TargetRepoWire;
use repoforge_registry::{
    CommitStatusNotifier, DeploymentNotifier, NullDeploymentNotifier, RepoEntry, RepoRegistry, TelegramNotifier,
};

use crate::cli::ScheduleArgs;
use crate::env;

/// Persisted queue snapshots are discarded across a wire-format change; bump
/// whenever `SavableJob`'s shape changes in a way that isn't backward
/// compatible.
const QUEUE_SCHEMA_VERSION: u32 = 1;

pub async fn run(args: ScheduleArgs) -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&args.redis.url()).await?);

    let source_repos: Vec<RepoEntry> = env::parse_json("PACKAGE_REPOS", &args.package_repos)?;
    let target_repos: Vec<TargetRepoWire> = env::parse_json("PACKAGE_TARGET_REPOS", &args.package_target_repos)?;
    let notifier_names: Vec<String> =
        env::parse_json("PACKAGE_REPOS_NOTIFIERS", &args.package_repos_notifiers)?;
    if !notifier_names.is_empty() {
        tracing::warn!(
            repos = ?notifier_names,
            "PACKAGE_REPOS_NOTIFIERS configured but no commit-status notifier backend is wired up; falling back to NullNotifier for all of them"
        );
    }
    let notifiers: HashMap<String, Arc<dyn CommitStatusNotifier>> = HashMap::new();
    let registry = Arc::new(RepoRegistry::new(source_repos, target_repos, notifiers));

    let nodes = BusNodePresence::spawn(bus.clone()).await?;
    let database = Arc::new(BusDatabaseClient::new(bus.clone()));

    let deployment_notifier: Arc<dyn DeploymentNotifier> =
        match (args.telegram_bot_token, args.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Arc::new(TelegramNotifier::new(token, chat_id)),
            _ => Arc::new(NullDeploymentNotifier),
        };

    let coordinator = Arc::new(Coordinator::new(
        bus.clone(),
        registry,
        nodes,
        database,
        deployment_notifier,
        QUEUE_SCHEMA_VERSION,
        args.logs_url,
        args.builder_image,
    ));

    coordinator.restore().await?;
    tracing::info!("coordinator restored, serving svc.coordinator");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        result = repoforge_coordinator::serve(coordinator.clone(), bus) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
