pub mod algorithms;
pub mod config;
pub mod controller;
pub mod router;
pub mod switch;
pub mod topology;
pub mod wire;

use std::sync::Arc;
use tokio::sync::Mutex;

/// Identifier of a simulated host. Assigned sequentially by the controller,
/// starting at 0, in host-registration order.
pub type HostId = usize;

/// Logical egress/ingress slot on a host's side of one connection. Port 0 is
/// reserved to mean "no egress / table request" and is never assigned to a
/// real link.
pub type Port = u32;

/// The controller's live topology, shared between connection handlers.
/// Mutation and snapshot serialization happen under one lock acquisition.
pub type SharedTopology = Arc<Mutex<topology::TopologyStore>>;
