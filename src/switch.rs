//! The interactive switch simulator: parses operator commands, drives the
//! update exchange with the controller, and answers forwarding lookups from
//! the locally cached flow table.

use std::net::Ipv4Addr;
use std::time::Duration;

use log::info;
use tokio::io::BufReader;
use tokio::net::TcpStream;

use crate::wire::{self, FlowEntry, UpdateAction, UpdateRequest, WireError};
use crate::{HostId, Port};

/// Placeholder address for requests where the field is ignored.
const NO_ADDRESS: &str = "0.0.0.0";

pub const HELP: &str = "\
Command not recognized. Try:
       ADD [port#] [IPv4 address]
       ADD 0
         A [port#] [IPv4 address]
         A 0
    DELETE [port#]
         D [port#]
   FORWARD [IPv4 address]
         F [IPv4 address]
      exit";

/// One parsed operator command. Long and short spellings are equivalent;
/// anything else is rejected at parse time and answered with [`HELP`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { port: Port, address: String },
    /// `ADD 0`: fetch the current flow table without touching the topology.
    TableRequest,
    Delete { port: Port },
    Forward { address: String },
    Exit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["ADD" | "A", "0"] => Some(Command::TableRequest),
            ["ADD" | "A", port, address] if is_ipv4(address) => {
                let port: Port = port.parse().ok()?;
                (port != 0).then(|| Command::Add { port, address: (*address).to_string() })
            }
            ["DELETE" | "D", port] => Some(Command::Delete { port: port.parse().ok()? }),
            ["FORWARD" | "F", address] if is_ipv4(address) => {
                Some(Command::Forward { address: (*address).to_string() })
            }
            ["exit"] => Some(Command::Exit),
            _ => None,
        }
    }
}

/// Well-formed IPv4 literal: four dot-separated octets, 0-255, no leading
/// zeros. `Ipv4Addr` enforces exactly that grammar.
fn is_ipv4(text: &str) -> bool {
    text.parse::<Ipv4Addr>().is_ok()
}

/// Outcome of a forwarding lookup. All three are informational, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Port(Port),
    /// A table is cached but has no rule for the address.
    NoRule,
    /// No flow table has ever been received.
    NoTable,
}

/// Local state of one simulated switch. The cached flow table is replaced
/// wholesale by every completed exchange; there is no incremental merge.
pub struct SwitchAgent {
    switch_id: HostId,
    controller_addr: String,
    io_timeout: Duration,
    flow_table: Option<Vec<FlowEntry>>,
}

impl SwitchAgent {
    pub fn new(switch_id: HostId, controller_addr: String, io_timeout: Duration) -> Self {
        Self {
            switch_id,
            controller_addr,
            io_timeout,
            flow_table: None,
        }
    }

    pub fn switch_id(&self) -> HostId {
        self.switch_id
    }

    /// The cached table, or `None` before the first completed exchange.
    pub fn flow_table(&self) -> Option<&[FlowEntry]> {
        self.flow_table.as_deref()
    }

    pub fn forward(&self, address: &str) -> ForwardOutcome {
        match &self.flow_table {
            None => ForwardOutcome::NoTable,
            Some(table) => table
                .iter()
                .find(|entry| entry.address == address)
                .map(|entry| ForwardOutcome::Port(entry.port))
                .unwrap_or(ForwardOutcome::NoRule),
        }
    }

    pub async fn add(&mut self, port: Port, address: &str) -> Result<(), WireError> {
        self.exchange(UpdateAction::Add, port, address).await
    }

    pub async fn request_table(&mut self) -> Result<(), WireError> {
        self.exchange(UpdateAction::Add, 0, NO_ADDRESS).await
    }

    pub async fn delete(&mut self, port: Port) -> Result<(), WireError> {
        self.exchange(UpdateAction::Delete, port, NO_ADDRESS).await
    }

    /// One full round trip: update request out, new flow table in.
    async fn exchange(
        &mut self,
        action: UpdateAction,
        port: Port,
        address: &str,
    ) -> Result<(), WireError> {
        let request = UpdateRequest {
            switch: self.switch_id,
            action,
            port,
            address: address.to_string(),
        };

        let mut stream = wire::with_timeout(self.io_timeout, async {
            Ok(TcpStream::connect(self.controller_addr.as_str()).await?)
        })
        .await?;
        let (read_half, mut write_half) = stream.split();

        wire::with_timeout(
            self.io_timeout,
            wire::send_frame(&mut write_half, &request.encode()),
        )
        .await?;

        let mut reader = BufReader::new(read_half);
        let body = wire::with_timeout(self.io_timeout, wire::read_frame(&mut reader)).await?;
        let table = wire::parse_flow_table(&body)?;
        info!("received flow table with {} rules", table.len());
        self.flow_table = Some(table);
        Ok(())
    }
}
