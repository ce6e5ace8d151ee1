use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{self, MutableIpv4Packet};
use pnet::packet::udp::{self, MutableUdpPacket};

use super::{PacketError, PacketSpec};

pub const IPV4_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;

const DEFAULT_TTL: u8 = 64;
const DEFAULT_IDENTIFICATION: u16 = 1;

/// Serialize `spec` as IPv4 header + UDP header + payload
pub fn build_packet(spec: &PacketSpec) -> Result<Vec<u8>, PacketError> {
    let udp_len = UDP_HEADER_LEN + spec.payload.len();
    let total_len = IPV4_HEADER_LEN + udp_len;
    if total_len > u16::MAX as usize {
        return Err(PacketError::PayloadTooLarge {
            len: spec.payload.len(),
        });
    }

    let mut buf = vec![0u8; total_len];

    {
        let mut udp_pkt =
            MutableUdpPacket::new(&mut buf[IPV4_HEADER_LEN..]).ok_or(PacketError::Buffer)?;
        udp_pkt.set_source(spec.sport);
        udp_pkt.set_destination(spec.dport);
        udp_pkt.set_length(udp_len as u16);
        udp_pkt.set_payload(&spec.payload);
        let checksum = udp::ipv4_checksum(&udp_pkt.to_immutable(), &spec.src, &spec.dst);
        // zero means "no checksum" on the wire
        udp_pkt.set_checksum(if checksum == 0 { 0xFFFF } else { checksum });
    }

    {
        let mut ip_pkt = MutableIpv4Packet::new(&mut buf).ok_or(PacketError::Buffer)?;
        ip_pkt.set_version(4);
        ip_pkt.set_header_length((IPV4_HEADER_LEN / 4) as u8);
        ip_pkt.set_dscp(0);
        ip_pkt.set_ecn(0);
        ip_pkt.set_total_length(total_len as u16);
        ip_pkt.set_identification(DEFAULT_IDENTIFICATION);
        ip_pkt.set_flags(0);
        ip_pkt.set_fragment_offset(0);
        ip_pkt.set_ttl(DEFAULT_TTL);
        ip_pkt.set_next_level_protocol(IpNextHeaderProtocols::Udp);
        ip_pkt.set_source(spec.src);
        ip_pkt.set_destination(spec.dst);
        let checksum = ipv4::checksum(&ip_pkt.to_immutable());
        ip_pkt.set_checksum(checksum);
    }

    Ok(buf)
}
