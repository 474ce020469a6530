use std::sync::Arc;

use anyhow::Result;
use repoforge_bus::{Bus, RedisBus};
use repoforge_coordinator::CoordinatorRpc;
use repoforge_protocol::rpc::AutoRepoRemoveParams;

use crate::cli::AutoRepoRemoveArgs;

pub async fn run(args: AutoRepoRemoveArgs) -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&args.redis.url()).await?);
    let coordinator = CoordinatorRpc::new(bus);
    coordinator
        .auto_repo_remove(&AutoRepoRemoveParams {
            arch: args.arch,
            repo: args.repo,
            pkgbases: args.pkgbases,
        })
        .await?;
    Ok(())
}
