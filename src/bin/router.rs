use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use flowplane::config::ControlPlaneConfig;
use flowplane::router::Router;

#[derive(Parser)]
#[command(name = "router", about = "SDN router: stateless shortest-path flow-table service")]
struct Cli {
    /// Optional JSON config file; defaults apply otherwise.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured listen address.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ControlPlaneConfig::load(path)?,
        None => ControlPlaneConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.router_listen = listen;
    }

    let router = Router::bind(&config.router_listen, config.io_timeout()).await?;
    router.run().await
}
