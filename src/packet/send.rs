use std::io;
use std::net::{IpAddr, Ipv4Addr};

use anyhow::Result;
use nix::unistd::Uid;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::transport::{transport_channel, TransportChannelType, TransportSender};
use tracing::{debug, info};

/// Anything that can put a fully built IPv4 packet on the wire
pub trait Transmit {
    fn transmit(&mut self, packet: &[u8], dst: Ipv4Addr) -> io::Result<usize>;
}

/// Layer-3 raw socket; the kernel keeps our IP header as-is
pub struct RawSocketSender {
    tx: TransportSender,
}

impl RawSocketSender {
    pub fn open() -> io::Result<Self> {
        let (tx, _rx) = transport_channel(
            4096,
            TransportChannelType::Layer3(IpNextHeaderProtocols::Udp),
        )?;
        Ok(Self { tx })
    }
}

impl Transmit for RawSocketSender {
    fn transmit(&mut self, packet: &[u8], dst: Ipv4Addr) -> io::Result<usize> {
        let pkt = Ipv4Packet::new(packet).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "truncated IPv4 packet")
        })?;
        let sent = self.tx.send_to(pkt, IpAddr::V4(dst))?;
        debug!("Sent {} bytes to {}", sent, dst);
        Ok(sent)
    }
}

/// Logs packets instead of sending them
#[derive(Debug, Default)]
pub struct DryRun;

impl Transmit for DryRun {
    fn transmit(&mut self, packet: &[u8], dst: Ipv4Addr) -> io::Result<usize> {
        let hex: String = packet.iter().map(|b| format!("{:02x}", b)).collect();
        info!("[dry-run] {} bytes to {}: {}", packet.len(), dst, hex);
        Ok(packet.len())
    }
}

/// Raw sockets need an effective uid of 0
pub fn ensure_root() -> Result<()> {
    if !Uid::effective().is_root() {
        anyhow::bail!("Only root can run this script");
    }
    Ok(())
}
