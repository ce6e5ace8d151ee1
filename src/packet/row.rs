use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

use csv::{DeserializeRecordsIntoIter, ReaderBuilder};
use serde::{de, Deserialize, Deserializer};

use super::PacketError;

/// One CSV row, keyed by header name: `dst,src,sport,dport,payload`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PacketRow {
    pub dst: String,
    pub src: String,
    #[serde(deserialize_with = "trimmed_port")]
    pub sport: u16,
    #[serde(deserialize_with = "trimmed_port")]
    pub dport: u16,
    pub payload: String,
}

fn trimmed_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse()
        .map_err(|e| de::Error::custom(format!("invalid port '{}': {}", raw, e)))
}

/// A row with both endpoints resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSpec {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub sport: u16,
    pub dport: u16,
    pub payload: Vec<u8>,
}

impl PacketSpec {
    pub fn from_row(row: &PacketRow) -> Result<Self, PacketError> {
        Ok(Self {
            src: resolve_ipv4(&row.src)?,
            dst: resolve_ipv4(&row.dst)?,
            sport: row.sport,
            dport: row.dport,
            payload: row.payload.as_bytes().to_vec(),
        })
    }
}

/// IPv4 literal, or the first IPv4 address the resolver returns
pub fn resolve_ipv4(host: &str) -> Result<Ipv4Addr, PacketError> {
    let host = host.trim();
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }

    let resolve_err = || PacketError::Resolve {
        host: host.to_string(),
    };
    if host.is_empty() || host.parse::<IpAddr>().is_ok() {
        return Err(resolve_err());
    }

    (host, 0u16)
        .to_socket_addrs()
        .map_err(|_| resolve_err())?
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(resolve_err)
}

/// Header-keyed row iterator over a CSV source
pub fn read_rows<R: Read>(reader: R) -> DeserializeRecordsIntoIter<R, PacketRow> {
    ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader)
        .into_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_rows_by_header() {
        let csv = "sport,dport,dst,src,payload\n5140,514,127.0.0.1,10.0.0.7,<13>hello world\n";
        let rows: Vec<PacketRow> = read_rows(csv.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            rows,
            vec![PacketRow {
                dst: "127.0.0.1".into(),
                src: "10.0.0.7".into(),
                sport: 5140,
                dport: 514,
                payload: "<13>hello world".into(),
            }]
        );
    }

    #[test]
    fn test_ports_tolerate_padding() {
        let csv = "dst,src,sport,dport,payload\n127.0.0.1,10.0.0.1, 5000, 514 ,x\n";
        let row = read_rows(csv.as_bytes()).next().unwrap().unwrap();
        assert_eq!((row.sport, row.dport), (5000, 514));
    }

    #[test]
    fn test_bad_port_is_row_error() {
        let csv = "dst,src,sport,dport,payload\n127.0.0.1,127.0.0.1,70000,514,x\n";
        let mut rows = read_rows(csv.as_bytes());
        assert!(rows.next().unwrap().is_err());
    }

    #[test]
    fn test_resolve_literal() {
        assert_eq!(resolve_ipv4(" 192.168.1.20 ").unwrap(), Ipv4Addr::new(192, 168, 1, 20));
    }

    #[test]
    fn test_resolve_rejects_ipv6_and_empty() {
        assert!(matches!(resolve_ipv4("::1"), Err(PacketError::Resolve { .. })));
        assert!(matches!(resolve_ipv4(""), Err(PacketError::Resolve { .. })));
    }

    #[test]
    fn test_spec_payload_is_utf8_bytes() {
        let row = PacketRow {
            dst: "127.0.0.1".into(),
            src: "127.0.0.2".into(),
            sport: 1,
            dport: 2,
            payload: "é".into(),
        };
        let spec = PacketSpec::from_row(&row).unwrap();
        assert_eq!(spec.payload, vec![0xC3, 0xA9]);
        assert_eq!(spec.src, Ipv4Addr::new(127, 0, 0, 2));
    }
}
