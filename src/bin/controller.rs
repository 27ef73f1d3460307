use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use flowplane::config::ControlPlaneConfig;
use flowplane::controller::Controller;
use flowplane::topology::TopologyStore;

#[derive(Parser)]
#[command(name = "controller", about = "SDN controller: topology owner and exchange broker")]
struct Cli {
    /// Bootstrap topology file.
    #[arg(long, default_value = "topology.txt")]
    topology: PathBuf,

    /// Optional JSON config file; defaults apply otherwise.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured listen address.
    #[arg(long)]
    listen: Option<String>,

    /// Override the configured router address.
    #[arg(long)]
    router: Option<String>,
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
        config.controller_listen = listen;
    }
    if let Some(router) = cli.router {
        config.router_addr = router;
    }

    let store = TopologyStore::load(&cli.topology)?;
    info!(
        "loaded {} hosts and {} connections from {}",
        store.host_count(),
        store.connections().len(),
        cli.topology.display(),
    );

    let controller = Controller::bind(
        &config.controller_listen,
        config.router_addr.clone(),
        config.io_timeout(),
        store,
    )
    .await?;
    controller.run().await
}
