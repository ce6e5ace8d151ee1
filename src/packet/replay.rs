use std::io::Read;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{build_packet, read_rows, PacketRow, PacketSpec, Transmit};

/// Counters for one replay
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub rows: usize,
    pub sent: usize,
    pub skipped: usize,
}

fn send_row<T: Transmit>(row: &PacketRow, sink: &mut T) -> Result<usize> {
    let spec = PacketSpec::from_row(row)?;
    let packet = build_packet(&spec)?;
    let sent = sink
        .transmit(&packet, spec.dst)
        .with_context(|| format!("Failed to send packet to {}", spec.dst))?;
    Ok(sent)
}

/// Build and transmit one packet per CSV row
pub fn replay<R: Read, T: Transmit>(reader: R, sink: &mut T) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    let mut rows = read_rows(reader);

    // The header is parsed lazily; surface a broken one as a hard error
    rows.reader_mut()
        .headers()
        .context("Failed to read CSV header")?;

    for (idx, result) in rows.enumerate() {
        let row_num = idx + 1;
        stats.rows += 1;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping malformed row {}: {}", row_num, e);
                stats.skipped += 1;
                continue;
            }
        };

        info!(
            "{} {} {} {} {}",
            row.dst, row.src, row.sport, row.dport, row.payload
        );

        match send_row(&row, sink) {
            Ok(_) => stats.sent += 1,
            Err(e) => {
                warn!("Skipping row {}: {:#}", row_num, e);
                stats.skipped += 1;
            }
        }
    }

    info!(
        "Replayed {} rows: {} sent, {} skipped",
        stats.rows, stats.sent, stats.skipped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::ipv4::Ipv4Packet;
    use pnet::packet::udp::UdpPacket;
    use pnet::packet::Packet;
    use std::io;
    use std::net::Ipv4Addr;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(Vec<u8>, Ipv4Addr)>,
        fail: bool,
    }

    impl Transmit for Recorder {
        fn transmit(&mut self, packet: &[u8], dst: Ipv4Addr) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.sent.push((packet.to_vec(), dst));
            Ok(packet.len())
        }
    }

    const HEADER: &str = "dst,src,sport,dport,payload\n";

    #[test]
    fn test_replays_each_row() {
        let csv = format!(
            "{}127.0.0.1,10.0.0.1,5000,514,first\n127.0.0.2,10.0.0.2,5001,515,second\n",
            HEADER
        );
        let mut rec = Recorder::default();
        let stats = replay(csv.as_bytes(), &mut rec).unwrap();

        assert_eq!(stats, ReplayStats { rows: 2, sent: 2, skipped: 0 });
        assert_eq!(rec.sent[1].1, Ipv4Addr::new(127, 0, 0, 2));

        let ip = Ipv4Packet::new(&rec.sent[0].0).unwrap();
        let udp_pkt = UdpPacket::new(ip.payload()).unwrap();
        assert_eq!(udp_pkt.get_destination(), 514);
        assert_eq!(udp_pkt.payload(), b"first");
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let csv = format!(
            "{}127.0.0.1,10.0.0.1,notaport,514,x\n::1,10.0.0.1,1,2,y\n127.0.0.1,10.0.0.1,1,2,z\n",
            HEADER
        );
        let mut rec = Recorder::default();
        let stats = replay(csv.as_bytes(), &mut rec).unwrap();
        assert_eq!(stats, ReplayStats { rows: 3, sent: 1, skipped: 2 });
        assert_eq!(rec.sent.len(), 1);
    }

    #[test]
    fn test_padded_ports_are_sent() {
        let csv = format!("{}127.0.0.1,10.0.0.1, 5000, 514,x\n", HEADER);
        let mut rec = Recorder::default();
        let stats = replay(csv.as_bytes(), &mut rec).unwrap();
        assert_eq!(stats.sent, 1);

        let ip = Ipv4Packet::new(&rec.sent[0].0).unwrap();
        let udp_pkt = UdpPacket::new(ip.payload()).unwrap();
        assert_eq!(udp_pkt.get_source(), 5000);
        assert_eq!(udp_pkt.get_destination(), 514);
    }

    #[test]
    fn test_send_failure_is_skipped() {
        let csv = format!("{}127.0.0.1,10.0.0.1,1,2,x\n", HEADER);
        let mut rec = Recorder {
            fail: true,
            ..Default::default()
        };
        let stats = replay(csv.as_bytes(), &mut rec).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.sent, 0);
    }

    #[test]
    fn test_header_only() {
        let mut rec = Recorder::default();
        let stats = replay(HEADER.as_bytes(), &mut rec).unwrap();
        assert_eq!(stats, ReplayStats::default());
    }
}
