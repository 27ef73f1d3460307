//! The controller: owns the live topology, applies switch update requests,
//! and brokers the flow-table exchange with the router.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::topology::{ConnectionManager, TopologyStore};
use crate::wire::{self, UpdateAction, UpdateRequest, WireError};
use crate::SharedTopology;

pub struct Controller {
    listener: TcpListener,
    router_addr: String,
    io_timeout: Duration,
    topology: SharedTopology,
}

impl Controller {
    pub async fn bind(
        listen: &str,
        router_addr: String,
        io_timeout: Duration,
        store: TopologyStore,
    ) -> Result<Self> {
        let listener = TcpListener::bind(listen).await?;
        info!("controller listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            router_addr,
            io_timeout,
            topology: Arc::new(Mutex::new(store)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn topology(&self) -> SharedTopology {
        self.topology.clone()
    }

    /// Accept loop. Each accepted connection carries one full exchange:
    /// update request in, flow table back out.
    pub async fn run(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("switch connection from {addr}");
                    let topology = self.topology.clone();
                    let router_addr = self.router_addr.clone();
                    let io_timeout = self.io_timeout;
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_switch(stream, topology, &router_addr, io_timeout).await
                        {
                            error!("exchange with switch {addr} failed: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("failed to accept switch connection: {e}");
                }
            }
        }
    }
}

/// One full exchange. Update validation failures are logged and skipped, and
/// the exchange still answers with a flow table for the unmodified topology;
/// a malformed request or a failed router leg drops the connection instead.
async fn handle_switch(
    mut stream: TcpStream,
    topology: SharedTopology,
    router_addr: &str,
    io_timeout: Duration,
) -> Result<(), WireError> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    let frame = wire::with_timeout(io_timeout, wire::read_frame(&mut reader)).await?;
    let request = UpdateRequest::parse(&frame)?;

    // Mutation and snapshot serialization share one critical section, so
    // concurrent exchanges each see a consistent topology.
    let packet = {
        let mut store = topology.lock().await;
        apply_update(&mut store, &request);
        store.topology_packet(request.switch)
    };

    let table = query_router(router_addr, &packet, io_timeout).await?;
    info!("flow table with {} lines relayed to switch {}", table.lines().count(), request.switch);

    wire::with_timeout(io_timeout, wire::send_frame(&mut write_half, &table)).await
}

/// Applies one update request to the store. Rejections only cancel the
/// mutation, never the exchange.
fn apply_update(store: &mut TopologyStore, request: &UpdateRequest) {
    if request.is_table_request() {
        info!("flow table request from host {}", request.switch);
        return;
    }

    let dst = store.id_of(&request.address);
    let mut manager = ConnectionManager::new(store);
    let outcome = match request.action {
        UpdateAction::Add => {
            manager.add_connection(request.switch, request.port, dst, &request.address)
        }
        UpdateAction::Delete => manager.delete_connection(request.switch, request.port),
    };

    if let Err(e) = outcome {
        warn!("update request {:?} rejected: {e}", request.encode());
    }
}

/// The controller→router leg: one connection, topology packet out, flow
/// table packet back.
async fn query_router(
    router_addr: &str,
    packet: &str,
    io_timeout: Duration,
) -> Result<String, WireError> {
    let mut stream = wire::with_timeout(io_timeout, async {
        Ok(TcpStream::connect(router_addr).await?)
    })
    .await?;
    let (read_half, mut write_half) = stream.split();

    wire::with_timeout(io_timeout, wire::send_frame(&mut write_half, packet)).await?;

    let mut reader = BufReader::new(read_half);
    wire::with_timeout(io_timeout, wire::read_frame(&mut reader)).await
}
