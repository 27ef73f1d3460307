pub mod manager;

pub use manager::{ConnectionManager, TopologyError};

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::wire::TopologyPacket;
use crate::{HostId, Port};

/// A simulated network endpoint. Hosts are never removed; a host with no
/// connections simply has no nonzero entries in the adjacency matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub id: HostId,
    pub address: String,
}

/// One directed entry: host `src` forwards to `dst` via local port `port`.
/// Links are kept bidirectional by inserting entries in pairs, each side
/// with its own port number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub src: HostId,
    pub port: Port,
    pub dst: HostId,
}

/// The controller's view of the network: the host id↔address mapping and
/// the directed connection set, indexed for O(1) lookups.
#[derive(Debug, Default)]
pub struct TopologyStore {
    hosts: Vec<Host>,
    ids_by_address: HashMap<String, HostId>,
    // Outgoing connections per host, keyed by the local port number.
    outgoing: HashMap<HostId, HashMap<Port, HostId>>,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Hosts in registration order.
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn address_of(&self, id: HostId) -> Option<&str> {
        self.hosts.get(id).map(|host| host.address.as_str())
    }

    pub fn id_of(&self, address: &str) -> Option<HostId> {
        self.ids_by_address.get(address).copied()
    }

    /// Appends a new host with the next sequential id. No dedup here; the
    /// caller checks `id_of` first.
    pub fn register_host(&mut self, address: &str) -> HostId {
        let id = self.hosts.len();
        self.hosts.push(Host {
            id,
            address: address.to_string(),
        });
        self.ids_by_address.insert(address.to_string(), id);
        id
    }

    pub fn port_in_use(&self, host: HostId, port: Port) -> bool {
        self.outgoing
            .get(&host)
            .is_some_and(|ports| ports.contains_key(&port))
    }

    pub fn connected(&self, src: HostId, dst: HostId) -> bool {
        self.outgoing
            .get(&src)
            .is_some_and(|ports| ports.values().any(|&d| d == dst))
    }

    pub(crate) fn insert(&mut self, conn: Connection) {
        self.outgoing
            .entry(conn.src)
            .or_default()
            .insert(conn.port, conn.dst);
    }

    /// Removes the outgoing connection of `src` on `port`, returning the
    /// destination it pointed at.
    pub(crate) fn remove(&mut self, src: HostId, port: Port) -> Option<HostId> {
        self.outgoing.get_mut(&src)?.remove(&port)
    }

    /// Removes every outgoing connection of `src` whose destination is
    /// `dst`, returning the freed ports.
    pub(crate) fn remove_all_toward(&mut self, src: HostId, dst: HostId) -> Vec<Port> {
        let Some(ports) = self.outgoing.get_mut(&src) else {
            return Vec::new();
        };
        let mut removed: Vec<Port> = ports
            .iter()
            .filter(|&(_, &d)| d == dst)
            .map(|(&port, _)| port)
            .collect();
        for port in &removed {
            ports.remove(port);
        }
        removed.sort_unstable();
        removed
    }

    /// Every directed connection, ordered by source id then port.
    pub fn connections(&self) -> Vec<Connection> {
        let mut all: Vec<Connection> = self
            .outgoing
            .iter()
            .flat_map(|(&src, ports)| {
                ports.iter().map(move |(&port, &dst)| Connection { src, port, dst })
            })
            .collect();
        all.sort_by_key(|conn| (conn.src, conn.port));
        all
    }

    /// Rebuilds the N×N adjacency matrix from the connection set.
    /// `matrix[i][j]` is the egress port on host i toward host j, 0 if the
    /// hosts are not directly linked.
    pub fn adjacency_matrix(&self) -> Vec<Vec<Port>> {
        let n = self.hosts.len();
        let mut matrix = vec![vec![0; n]; n];
        for (&src, ports) in &self.outgoing {
            for (&port, &dst) in ports {
                if src < n && dst < n {
                    matrix[src][dst] = port;
                }
            }
        }
        matrix
    }

    /// Serializes the current topology as the wire packet consumed by the
    /// router, with `source` in the header.
    pub fn topology_packet(&self, source: HostId) -> String {
        TopologyPacket {
            source,
            hosts: self.hosts.clone(),
            matrix: self.adjacency_matrix(),
        }
        .encode()
    }

    /// Parses the bootstrap topology file format: a `"label, N"` header,
    /// N `"id=address"` lines, then the N×N adjacency matrix. Blank lines
    /// and interior spaces are tolerated.
    pub fn from_bootstrap(text: &str) -> Result<Self> {
        let mut store = Self::new();
        let mut lines = text.lines();

        let header: String = lines
            .next()
            .context("bootstrap file is empty")?
            .replace(' ', "");
        let count: usize = header
            .split(',')
            .nth(1)
            .context("bootstrap header is missing the vertex count")?
            .parse()
            .context("bootstrap header has a non-numeric vertex count")?;

        for _ in 0..count {
            let line: String = lines
                .next()
                .context("bootstrap file ends before the host map")?
                .replace(' ', "");
            let (id, address) = line
                .split_once('=')
                .with_context(|| format!("bad host map line {line:?}"))?;
            let id: HostId = id
                .parse()
                .with_context(|| format!("bad host id in line {line:?}"))?;
            if id != store.host_count() {
                bail!("host ids must be sequential, got {id}");
            }
            if address.is_empty() {
                bail!("empty address in host map line");
            }
            store.register_host(address);
        }

        let mut rows = 0;
        for line in lines.filter(|line| !line.trim().is_empty()) {
            if rows == count {
                bail!("bootstrap matrix has more than {count} rows");
            }
            let row: Vec<Port> = line
                .replace(' ', "")
                .split(',')
                .map(|cell| cell.parse::<Port>())
                .collect::<Result<_, _>>()
                .with_context(|| format!("bad matrix row {line:?}"))?;
            if row.len() != count {
                bail!("matrix row {rows} has {} columns, expected {count}", row.len());
            }
            for (dst, &port) in row.iter().enumerate() {
                if port != 0 {
                    store.insert(Connection { src: rows, port, dst });
                }
            }
            rows += 1;
        }
        if rows != count {
            bail!("bootstrap matrix has {rows} rows, expected {count}");
        }

        Ok(store)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read topology file {}", path.display()))?;
        Self::from_bootstrap(&text)
    }
}
