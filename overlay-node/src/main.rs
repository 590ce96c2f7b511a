use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let json_logs = std::env::var("NODE_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("overlay_node=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = overlay_node::config::NodeConfig::parse();
    tracing::info!("starting overlay node on {}", config.listen_addr);
    match &config.boot_node {
        Some(boot) => tracing::info!("joining network via boot node {boot}"),
        None => tracing::info!("no BOOT_NODE set: this process is the boot node"),
    }

    let server = overlay_node::server::Server::new(config);
    server.run().await
}
