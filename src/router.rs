//! The router: a stateless flow-table service. Each connection carries one
//! topology packet in and one flow-table packet back; requests are
//! independent and order-insensitive.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use log::{error, info};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::algorithms::dijkstra::{build_flow_table, shortest_paths};
use crate::wire::{self, FlowEntry, TopologyPacket, WireError};

pub struct Router {
    listener: TcpListener,
    io_timeout: Duration,
}

impl Router {
    pub async fn bind(listen: &str, io_timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind(listen).await?;
        info!("router listening on {}", listener.local_addr()?);
        Ok(Self { listener, io_timeout })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("controller connection from {addr}");
                    let io_timeout = self.io_timeout;
                    tokio::spawn(async move {
                        if let Err(e) = handle_controller(stream, io_timeout).await {
                            error!("exchange with controller {addr} failed: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("failed to accept controller connection: {e}");
                }
            }
        }
    }
}

/// Computes the flow table for one topology packet. A table with no
/// reachable destinations still answers with the explicit empty sentinel.
pub fn flow_table_for(packet: &TopologyPacket) -> Vec<FlowEntry> {
    let prev = shortest_paths(packet.source, &packet.matrix);
    build_flow_table(packet.source, &prev, &packet.matrix, &packet.hosts)
}

async fn handle_controller(mut stream: TcpStream, io_timeout: Duration) -> Result<(), WireError> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    let frame = wire::with_timeout(io_timeout, wire::read_frame(&mut reader)).await?;
    let packet = TopologyPacket::parse(&frame)?;
    info!(
        "computing flow table for host {} over {} hosts",
        packet.source,
        packet.hosts.len(),
    );

    let table = flow_table_for(&packet);
    let body = wire::encode_flow_table(&table);
    wire::with_timeout(io_timeout, wire::send_frame(&mut write_half, &body)).await
}
