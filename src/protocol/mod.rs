//! Protocol module - command table, framing, and packet types.
//!
//! This module implements the Gearman binary wire format:
//! - 12-byte header encoding/decoding (magic, command code, length)
//! - Packet buffer for accumulating partial reads
//! - Packet struct with named-field accessors

pub mod command;
mod packet;
mod packet_buffer;

pub use command::{Command, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, REQ_MAGIC, RES_MAGIC};
pub use packet::{build_request, build_response, Packet};
pub use packet_buffer::PacketBuffer;
