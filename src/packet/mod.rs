//! Raw IPv4/UDP packet construction and transmission from CSV rows.

mod build;
mod replay;
mod row;
mod send;

use thiserror::Error;

pub use build::{build_packet, IPV4_HEADER_LEN, UDP_HEADER_LEN};
pub use replay::{replay, ReplayStats};
pub use row::{read_rows, resolve_ipv4, PacketRow, PacketSpec};
pub use send::{ensure_root, DryRun, RawSocketSender, Transmit};

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("could not resolve '{host}' to an IPv4 address")]
    Resolve { host: String },

    #[error("payload of {len} bytes does not fit in a single IPv4 datagram")]
    PayloadTooLarge { len: usize },

    #[error("packet buffer too small")]
    Buffer,
}
