use std::sync::Arc;

use anyhow::Result;
use bollard::Docker;
use repoforge_bus::{Bus, RedisBus};
use repoforge_builder::{BuilderAgent, BuilderConfig, ScpUploadClient};
use repoforge_coordinator::spawn_announcer;
use repoforge_database::BusDatabaseClient;
use repoforge_protocol::rpc::BrokerNode;
use repoforge_runtime::{BollardRuntime, ContainerRuntime, EngineKind, ScheduledPull};

use crate::cli::BuilderArgs;

fn engine_kind(name: &str) -> EngineKind {
    match name {
        "podman" => EngineKind::Podman,
        _ => EngineKind::Docker,
    }
}

pub async fn run(args: BuilderArgs) -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&args.redis.url()).await?);

    let node_id = format!("{}-{}", args.builder_hostname, uuid::Uuid::new_v4().simple());

    let config = BuilderConfig {
        hostname: args.builder_hostname.clone(),
        builder_image: args.builder_image.clone(),
        build_timeout_secs: args.builder_timeout,
        ci_code_skip: args.ci_code_skip,
        shared_path: args.shared_path,
        pkgbuilds_path: args.repo_path,
    };

    let docker = Docker::connect_with_local_defaults()?;
    let engine = engine_kind(&args.container_engine);
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(BollardRuntime::new(docker, engine));
    let pull = ScheduledPull::new(runtime.clone());
    pull.arm(Some(config.builder_image.clone())).await?;

    let database = Arc::new(BusDatabaseClient::new(bus.clone()));
    let upload = Arc::new(ScpUploadClient::new(args.ssh_identity_file));

    let agent = Arc::new(BuilderAgent::new(runtime, database, upload, bus.clone(), config));

    let announcer = spawn_announcer(
        bus.clone(),
        BrokerNode {
            id: node_id.clone(),
            pure_name: args.builder_hostname,
            service: "builder".to_string(),
            present: true,
            build_class: args.builder_class,
            version: 1,
        },
    );

    tracing::info!(node_id = %node_id, "builder agent serving svc.builder.{node_id}");
    let result = repoforge_builder::serve(agent, bus, &node_id).await;
    announcer.abort();
    Ok(result?)
}
