use std::sync::Arc;

use anyhow::Result;
use repoforge_bus::{Bus, RedisBus};
use repoforge_web::WebConfig;

use crate::cli::WebArgs;

pub async fn run(args: WebArgs) -> Result<()> {
    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&args.redis.url()).await?);

    let config = WebConfig {
        bind_addr: args.web_bind_addr,
        static_dir: args.web_static_dir,
    };
    repoforge_web::serve(config, bus).await?;
    Ok(())
}
