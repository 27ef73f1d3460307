use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use flowplane::config::ControlPlaneConfig;
use flowplane::switch::{Command, ForwardOutcome, SwitchAgent, HELP};
use flowplane::wire::WireError;

#[derive(Parser)]
#[command(name = "switch", about = "Interactive switch simulator")]
struct Cli {
    /// Host id this switch simulates.
    #[arg(long)]
    id: usize,

    /// Optional JSON config file; defaults apply otherwise.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured controller address.
    #[arg(long)]
    controller: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ControlPlaneConfig::load(path)?,
        None => ControlPlaneConfig::default(),
    };
    if let Some(controller) = cli.controller {
        config.controller_addr = controller;
    }

    let mut agent = SwitchAgent::new(cli.id, config.controller_addr.clone(), config.io_timeout());

    println!("Welcome to the interactive switch simulator!");
    println!(
        "Simulating switch {} against controller {}. Ensure the router and\n\
         controller programs are running.",
        cli.id, config.controller_addr,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Some(Command::Add { port, address }) => report(agent.add(port, &address).await),
            Some(Command::TableRequest) => report(agent.request_table().await),
            Some(Command::Delete { port }) => report(agent.delete(port).await),
            Some(Command::Forward { address }) => match agent.forward(&address) {
                ForwardOutcome::Port(port) => println!("Forwarding packet out port {port}."),
                ForwardOutcome::NoRule => println!("No rule to match for packet."),
                ForwardOutcome::NoTable => println!("Error: No flow table."),
            },
            Some(Command::Exit) => break,
            None => println!("{HELP}"),
        }
        prompt()?;
    }

    Ok(())
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

fn report(outcome: Result<(), WireError>) {
    match outcome {
        Ok(()) => println!("New flow table received."),
        Err(e) => println!("Exchange failed: {e}"),
    }
}
