//! Wire protocol shared by the controller, router, and switch. Message
//! bodies are newline-delimited plain text; each message travels as one
//! frame, a decimal byte-count header line followed by exactly that many
//! body bytes. The framed transport replaces the reference protocol's
//! whole-buffer-as-message reads and is not byte-compatible with it.

use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::topology::Host;
use crate::{HostId, Port};

/// Sent in place of a zero-length flow table; a zero-length body would be
/// indistinguishable from a stalled connection in the reference protocol.
pub const EMPTY_TABLE: &str = "EMPTY";

/// Upper bound on a frame body. Topology packets grow with the square of
/// the host count, so this allows a few hundred hosts.
pub const MAX_FRAME: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME} byte limit")]
    FrameTooLarge(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn malformed(reason: impl Into<String>) -> WireError {
    WireError::MalformedPacket(reason.into())
}

/// Bounds one socket operation. A timed-out exchange is aborted, never
/// retried.
pub async fn with_timeout<F, T>(limit: Duration, op: F) -> Result<T, WireError>
where
    F: Future<Output = Result<T, WireError>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(WireError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "socket operation timed out",
        ))),
    }
}

/// Writes one framed message.
pub async fn send_frame<W>(writer: &mut W, body: &str) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(format!("{}\n", body.len()).as_bytes()).await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one framed message.
pub async fn read_frame<R>(reader: &mut R) -> Result<String, WireError>
where
    R: AsyncBufRead + Unpin,
{
    let mut header = String::new();
    if reader.read_line(&mut header).await? == 0 {
        return Err(malformed("connection closed before the frame header"));
    }
    let len: usize = header
        .trim()
        .parse()
        .map_err(|_| malformed(format!("bad frame header {:?}", header.trim())))?;
    if len > MAX_FRAME {
        return Err(WireError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    String::from_utf8(body).map_err(|_| malformed("frame body is not valid UTF-8"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    Add,
    Delete,
}

impl UpdateAction {
    fn as_str(self) -> &'static str {
        match self {
            UpdateAction::Add => "ADD",
            UpdateAction::Delete => "DELETE",
        }
    }
}

/// Switch→controller request: `"<switchID>, <ADD|DELETE>, <port>, <address>"`.
/// Port 0 means "send the current flow table, no topology change"; the
/// address field is ignored then and conventionally `0.0.0.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub switch: HostId,
    pub action: UpdateAction,
    pub port: Port,
    pub address: String,
}

impl UpdateRequest {
    pub fn is_table_request(&self) -> bool {
        self.port == 0
    }

    pub fn encode(&self) -> String {
        format!(
            "{}, {}, {}, {}",
            self.switch,
            self.action.as_str(),
            self.port,
            self.address,
        )
    }

    pub fn parse(line: &str) -> Result<Self, WireError> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        let [switch, action, port, address] = fields.as_slice() else {
            return Err(malformed(format!(
                "update request has {} fields, expected 4",
                fields.len(),
            )));
        };
        let action = match *action {
            "ADD" => UpdateAction::Add,
            "DELETE" => UpdateAction::Delete,
            other => return Err(malformed(format!("unknown update action {other:?}"))),
        };
        Ok(Self {
            switch: switch
                .parse()
                .map_err(|_| malformed(format!("bad switch id {switch:?}")))?,
            action,
            port: port
                .parse()
                .map_err(|_| malformed(format!("bad port number {port:?}")))?,
            address: (*address).to_string(),
        })
    }
}

/// Controller→router packet: header `"<source>, <hostCount>"`, one
/// `"<id> = <address>"` line per host in registration order, a blank
/// separator, then `hostCount` comma-separated adjacency rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyPacket {
    pub source: HostId,
    pub hosts: Vec<Host>,
    pub matrix: Vec<Vec<Port>>,
}

impl TopologyPacket {
    pub fn encode(&self) -> String {
        let mut packet = String::new();
        writeln!(packet, "{}, {}", self.source, self.hosts.len()).unwrap();
        for host in &self.hosts {
            writeln!(packet, "{} = {}", host.id, host.address).unwrap();
        }
        packet.push('\n');
        for row in &self.matrix {
            let cells: Vec<String> = row.iter().map(Port::to_string).collect();
            writeln!(packet, "{}", cells.join(", ")).unwrap();
        }
        packet
    }

    pub fn parse(text: &str) -> Result<Self, WireError> {
        let mut lines = text.lines();

        let header: String = lines
            .next()
            .ok_or_else(|| malformed("empty topology packet"))?
            .replace(' ', "");
        let (source, count) = header
            .split_once(',')
            .ok_or_else(|| malformed(format!("bad topology header {header:?}")))?;
        let source: HostId = source
            .parse()
            .map_err(|_| malformed(format!("bad source id {source:?}")))?;
        let count: usize = count
            .parse()
            .map_err(|_| malformed(format!("bad host count {count:?}")))?;

        let mut hosts = Vec::with_capacity(count);
        for _ in 0..count {
            let line: String = lines
                .next()
                .ok_or_else(|| malformed("topology packet ends inside the host map"))?
                .replace(' ', "");
            let (id, address) = line
                .split_once('=')
                .ok_or_else(|| malformed(format!("bad host map line {line:?}")))?;
            let id: HostId = id
                .parse()
                .map_err(|_| malformed(format!("bad host id {id:?}")))?;
            if address.is_empty() {
                return Err(malformed("empty address in host map"));
            }
            hosts.push(Host { id, address: address.to_string() });
        }

        let mut matrix = Vec::with_capacity(count);
        for line in lines.filter(|line| !line.trim().is_empty()) {
            let row: Vec<Port> = line
                .replace(' ', "")
                .split(',')
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(|_| malformed(format!("bad matrix row {line:?}")))?;
            if row.len() != count {
                return Err(malformed(format!(
                    "matrix row has {} columns, expected {count}",
                    row.len(),
                )));
            }
            matrix.push(row);
        }
        if matrix.len() != count {
            return Err(malformed(format!(
                "matrix has {} rows, expected {count}",
                matrix.len(),
            )));
        }

        Ok(Self { source, hosts, matrix })
    }
}

/// One flow-table row: the egress port used to reach a destination address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowEntry {
    pub address: String,
    pub port: Port,
}

/// Router→controller→switch packet: one `"<address>, <port>"` line per
/// reachable destination, or the `EMPTY` sentinel when nothing is reachable.
pub fn encode_flow_table(entries: &[FlowEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_TABLE.to_string();
    }
    let mut packet = String::new();
    for entry in entries {
        writeln!(packet, "{}, {}", entry.address, entry.port).unwrap();
    }
    packet
}

pub fn parse_flow_table(text: &str) -> Result<Vec<FlowEntry>, WireError> {
    if text.trim() == EMPTY_TABLE {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let (address, port) = line
            .split_once(',')
            .ok_or_else(|| malformed(format!("bad flow table line {line:?}")))?;
        entries.push(FlowEntry {
            address: address.trim().to_string(),
            port: port
                .trim()
                .parse()
                .map_err(|_| malformed(format!("bad flow table port {port:?}")))?,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn sample_packet() -> TopologyPacket {
        TopologyPacket {
            source: 1,
            hosts: vec![
                Host { id: 0, address: "10.0.0.1".into() },
                Host { id: 1, address: "10.0.0.2".into() },
            ],
            matrix: vec![vec![0, 1], vec![1, 0]],
        }
    }

    #[test]
    fn update_request_round_trip() {
        let request = UpdateRequest {
            switch: 6,
            action: UpdateAction::Add,
            port: 2,
            address: "10.0.0.4".into(),
        };
        assert_eq!(request.encode(), "6, ADD, 2, 10.0.0.4");
        assert_eq!(UpdateRequest::parse(&request.encode()).unwrap(), request);
    }

    #[test]
    fn table_request_is_port_zero() {
        let request = UpdateRequest::parse("6, ADD, 0, 0.0.0.0").unwrap();
        assert!(request.is_table_request());
    }

    #[test]
    fn update_request_rejects_bad_action() {
        assert!(UpdateRequest::parse("6, DROP, 2, 10.0.0.4").is_err());
        assert!(UpdateRequest::parse("6, ADD, 2").is_err());
        assert!(UpdateRequest::parse("x, ADD, 2, 10.0.0.4").is_err());
    }

    #[test]
    fn topology_packet_layout_matches_wire_contract() {
        assert_eq!(
            sample_packet().encode(),
            "1, 2\n0 = 10.0.0.1\n1 = 10.0.0.2\n\n0, 1\n1, 0\n",
        );
    }

    #[test]
    fn topology_packet_round_trip() {
        let packet = sample_packet();
        assert_eq!(TopologyPacket::parse(&packet.encode()).unwrap(), packet);
    }

    #[test]
    fn topology_packet_with_no_hosts_round_trips() {
        let packet = TopologyPacket { source: 0, hosts: vec![], matrix: vec![] };
        assert_eq!(TopologyPacket::parse(&packet.encode()).unwrap(), packet);
    }

    #[test]
    fn topology_parse_rejects_count_mismatches() {
        // Header promises two hosts, only one present.
        assert!(TopologyPacket::parse("1, 2\n0 = 10.0.0.1\n").is_err());
        // Missing matrix row.
        assert!(TopologyPacket::parse("1, 2\n0 = 10.0.0.1\n1 = 10.0.0.2\n\n0, 1\n").is_err());
        // Ragged matrix row.
        assert!(
            TopologyPacket::parse("1, 2\n0 = 10.0.0.1\n1 = 10.0.0.2\n\n0, 1\n1\n").is_err()
        );
    }

    #[test]
    fn flow_table_encodes_empty_sentinel() {
        assert_eq!(encode_flow_table(&[]), "EMPTY");
        assert_eq!(parse_flow_table("EMPTY").unwrap(), vec![]);
    }

    #[test]
    fn flow_table_round_trip() {
        let table = vec![
            FlowEntry { address: "10.0.0.2".into(), port: 1 },
            FlowEntry { address: "10.0.0.3".into(), port: 2 },
        ];
        let encoded = encode_flow_table(&table);
        assert_eq!(encoded, "10.0.0.2, 1\n10.0.0.3, 2\n");
        assert_eq!(parse_flow_table(&encoded).unwrap(), table);
    }

    #[tokio::test]
    async fn frames_round_trip_over_a_pipe() {
        let (mut near, far) = tokio::io::duplex(1024);
        send_frame(&mut near, "hello\nworld").await.unwrap();
        send_frame(&mut near, "").await.unwrap();
        drop(near);

        let mut reader = BufReader::new(far);
        assert_eq!(read_frame(&mut reader).await.unwrap(), "hello\nworld");
        assert_eq!(read_frame(&mut reader).await.unwrap(), "");
        assert!(read_frame(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let header = format!("{}\n", MAX_FRAME + 1);
        let mut reader = BufReader::new(header.as_bytes());
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(WireError::FrameTooLarge(_)),
        ));
    }
}
