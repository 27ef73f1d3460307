//! Single-source shortest paths over the adjacency matrix and the flow
//! table derived from them. Every nonzero matrix cell is a unit-cost edge;
//! link weights do not exist in this protocol.

use crate::topology::Host;
use crate::wire::FlowEntry;
use crate::{HostId, Port};

/// Computes the predecessor on the shortest path from `source` to every
/// node, `None` marking unreachable nodes (the source included, since it
/// has no predecessor).
///
/// Selection scans nodes in ascending index order and keeps the first
/// minimum found, so ties always resolve to the lowest index. Downstream
/// flow tables depend on that order being reproducible.
pub fn shortest_paths(source: HostId, matrix: &[Vec<Port>]) -> Vec<Option<HostId>> {
    let n = matrix.len();
    let mut dist = vec![u32::MAX; n];
    let mut prev: Vec<Option<HostId>> = vec![None; n];
    let mut visited = vec![false; n];
    if source < n {
        dist[source] = 0;
    }

    for _ in 0..n {
        let mut node = None;
        let mut best = u32::MAX;
        for candidate in 0..n {
            if !visited[candidate] && dist[candidate] < best {
                best = dist[candidate];
                node = Some(candidate);
            }
        }
        // Every still-unvisited node is unreachable; nothing left to relax.
        let Some(node) = node else { break };
        visited[node] = true;

        for (next, &cell) in matrix[node].iter().enumerate() {
            if cell != 0 && dist[node] + 1 < dist[next] {
                dist[next] = dist[node] + 1;
                prev[next] = Some(node);
            }
        }
    }

    prev
}

/// Walks the predecessor chain back from `dest` until the hop directly
/// after `source`, then reads the egress port off the source's matrix row.
/// The walk is bounded by the node count, so malformed predecessor data
/// cannot loop.
fn egress_port(
    source: HostId,
    dest: HostId,
    prev: &[Option<HostId>],
    matrix: &[Vec<Port>],
) -> Option<Port> {
    let mut hop = dest;
    for _ in 0..prev.len() {
        match prev.get(hop).copied().flatten() {
            Some(node) if node == source => return Some(matrix[source][hop]),
            Some(node) => hop = node,
            None => return None,
        }
    }
    None
}

/// Builds the flow table for `source`: one entry per reachable host, mapping
/// its address to the egress port on the source. Unreachable hosts and the
/// source itself never appear.
pub fn build_flow_table(
    source: HostId,
    prev: &[Option<HostId>],
    matrix: &[Vec<Port>],
    hosts: &[Host],
) -> Vec<FlowEntry> {
    let mut table = Vec::new();
    for (node, predecessor) in prev.iter().enumerate() {
        if predecessor.is_none() {
            continue;
        }
        let Some(port) = egress_port(source, node, prev, matrix) else {
            continue;
        };
        if let Some(host) = hosts.iter().find(|host| host.id == node) {
            table.push(FlowEntry { address: host.address.clone(), port });
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(addresses: &[&str]) -> Vec<Host> {
        addresses
            .iter()
            .enumerate()
            .map(|(id, address)| Host { id, address: (*address).to_string() })
            .collect()
    }

    #[test]
    fn direct_link_yields_single_entry() {
        // Hosts 0 and 1 linked on ports 1/1.
        let matrix = vec![vec![0, 1], vec![1, 0]];
        let prev = shortest_paths(0, &matrix);
        assert_eq!(prev, vec![None, Some(0)]);

        let table = build_flow_table(0, &prev, &matrix, &hosts(&["10.0.0.1", "10.0.0.2"]));
        assert_eq!(table, vec![FlowEntry { address: "10.0.0.2".into(), port: 1 }]);
    }

    #[test]
    fn chain_routes_through_the_middle_host() {
        // 0 -- 1 -- 2, no direct 0<->2 link. The egress toward 2 must be
        // the port for the 0->1 hop.
        let matrix = vec![vec![0, 7, 0], vec![1, 0, 2], vec![0, 1, 0]];
        let prev = shortest_paths(0, &matrix);
        assert_eq!(prev, vec![None, Some(0), Some(1)]);

        let table = build_flow_table(
            0,
            &prev,
            &matrix,
            &hosts(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]),
        );
        assert_eq!(
            table,
            vec![
                FlowEntry { address: "10.0.0.2".into(), port: 7 },
                FlowEntry { address: "10.0.0.3".into(), port: 7 },
            ],
        );
    }

    #[test]
    fn unreachable_hosts_are_excluded() {
        // Host 2 is isolated.
        let matrix = vec![vec![0, 1, 0], vec![1, 0, 0], vec![0, 0, 0]];
        let prev = shortest_paths(0, &matrix);
        assert_eq!(prev[2], None);

        let table = build_flow_table(
            0,
            &prev,
            &matrix,
            &hosts(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]),
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn isolated_source_yields_empty_table() {
        let matrix = vec![vec![0, 0], vec![0, 0]];
        let prev = shortest_paths(0, &matrix);
        let table = build_flow_table(0, &prev, &matrix, &hosts(&["10.0.0.1", "10.0.0.2"]));
        assert!(table.is_empty());
    }

    #[test]
    fn ties_resolve_to_the_lowest_index() {
        // Two equal-length paths to host 3: via 1 (port 1) or via 2
        // (port 2). Host 1 is visited first, so it becomes the predecessor.
        let matrix = vec![
            vec![0, 1, 2, 0],
            vec![1, 0, 0, 2],
            vec![1, 0, 0, 2],
            vec![0, 1, 2, 0],
        ];
        let prev = shortest_paths(0, &matrix);
        assert_eq!(prev[3], Some(1));

        let table = build_flow_table(
            0,
            &prev,
            &matrix,
            &hosts(&["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"]),
        );
        assert!(table.contains(&FlowEntry { address: "10.0.0.4".into(), port: 1 }));
    }

    #[test]
    fn predecessor_chains_terminate_within_node_count() {
        let matrix = vec![
            vec![0, 1, 0, 0],
            vec![1, 0, 2, 0],
            vec![0, 1, 0, 3],
            vec![0, 0, 1, 0],
        ];
        let prev = shortest_paths(0, &matrix);
        for mut node in 0..matrix.len() {
            let mut steps = 0;
            while let Some(p) = prev[node] {
                node = p;
                steps += 1;
                assert!(steps < matrix.len(), "chain longer than N-1 steps");
            }
            assert_eq!(node, 0, "reachable chains terminate at the source");
        }
    }

    #[test]
    fn corrupt_predecessor_data_does_not_hang() {
        // A prev cycle that never reaches the source.
        let matrix = vec![vec![0, 1, 0], vec![1, 0, 1], vec![0, 1, 0]];
        let prev = vec![None, Some(2), Some(1)];
        assert_eq!(egress_port(0, 2, &prev, &matrix), None);
    }

    #[test]
    fn source_outside_matrix_reaches_nothing() {
        let matrix = vec![vec![0, 1], vec![1, 0]];
        let prev = shortest_paths(9, &matrix);
        assert_eq!(prev, vec![None, None]);
    }
}
