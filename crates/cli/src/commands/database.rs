use std::sync::Arc;

use anyhow::Result;
use bollard::Docker;
use repoforge_bus::{Bus, RedisBus};
use repoforge_database::{DatabaseService, DatabaseServiceConfig};
use repoforge_protocol::rpc::SshInfo;
use repoforge_runtime::{BollardRuntime, ContainerRuntime, EngineKind};

use crate::cli::DatabaseArgs;

fn engine_kind(name: &str) -> EngineKind {
    match name {
        "podman" => EngineKind::Podman,
        _ => EngineKind::Docker,
    }
}

pub async fn run(args: DatabaseArgs) -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&args.redis.url()).await?);

    let config = DatabaseServiceConfig {
        database_image: args.builder_image,
        repo_path: args.repo_path,
        gpg_path: args.gpg_path,
        ssh: SshInfo {
            host: args.database_host,
            port: args.database_port,
            user: args.database_user,
        },
        landing_zone: args.landing_zone_path,
    };

    let docker = Docker::connect_with_local_defaults()?;
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(BollardRuntime::new(docker, engine_kind(&args.container_engine)));
    let service = Arc::new(DatabaseService::new(runtime, config));

    tracing::info!("database service serving svc.database");
    service.serve(bus).await?;
    Ok(())
}
