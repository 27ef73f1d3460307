use log::{info, warn};
use thiserror::Error;

use super::{Connection, TopologyStore};
use crate::{HostId, Port};

/// Why an ADD or DELETE request was rejected. A rejected request leaves the
/// topology untouched; validation runs before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("hosts {src} and {dst} are already connected, redundant connections forbidden")]
    DuplicateConnection { src: HostId, dst: HostId },
    #[error("port {port} is already in use on host {host}")]
    PortInUse { host: HostId, port: Port },
    #[error("host {host} has no connection on port {port}")]
    ConnectionNotFound { host: HostId, port: Port },
}

/// Applies topology-change requests to an explicitly passed store. Every
/// accepted ADD inserts both directions of the link; every accepted DELETE
/// removes both.
pub struct ConnectionManager<'a> {
    store: &'a mut TopologyStore,
}

impl<'a> ConnectionManager<'a> {
    pub fn new(store: &'a mut TopologyStore) -> Self {
        Self { store }
    }

    /// Adds the `src`→`dst` connection on `port` plus the reverse direction
    /// on an automatically chosen port. `dst` is `None` when the destination
    /// address is not yet part of the network; the host is registered under
    /// `dst_address` first.
    pub fn add_connection(
        &mut self,
        src: HostId,
        port: Port,
        dst: Option<HostId>,
        dst_address: &str,
    ) -> Result<(), TopologyError> {
        if let Some(dst) = dst {
            if self.store.connected(src, dst) {
                return Err(TopologyError::DuplicateConnection { src, dst });
            }
        }
        if self.store.port_in_use(src, port) {
            return Err(TopologyError::PortInUse { host: src, port });
        }

        let dst = match dst {
            Some(id) => id,
            None => {
                let id = self.store.register_host(dst_address);
                info!("registered new host {id} ({dst_address})");
                id
            }
        };

        let reverse = self.find_available_port(dst);
        self.store.insert(Connection { src, port, dst });
        self.store.insert(Connection { src: dst, port: reverse, dst: src });
        info!("added connection {src}:{port} <-> {dst}:{reverse}");
        Ok(())
    }

    /// Removes the outgoing connection of `src` on `port` and every reverse
    /// entry pointing back at `src`. Normally exactly one reverse entry
    /// exists; if an inconsistent prior edit left several, all are removed.
    pub fn delete_connection(&mut self, src: HostId, port: Port) -> Result<(), TopologyError> {
        let dst = self
            .store
            .remove(src, port)
            .ok_or(TopologyError::ConnectionNotFound { host: src, port })?;

        let reverse = self.store.remove_all_toward(dst, src);
        if reverse.len() > 1 {
            warn!("removed {} parallel reverse entries from host {dst}", reverse.len());
        }
        info!("deleted connection {src}:{port} <-> {dst}:{reverse:?}");
        Ok(())
    }

    /// Smallest positive port number not already used by an outgoing
    /// connection of `host`.
    pub fn find_available_port(&self, host: HostId) -> Port {
        let mut candidate = 1;
        while self.store.port_in_use(host, candidate) {
            candidate += 1;
        }
        candidate
    }
}
