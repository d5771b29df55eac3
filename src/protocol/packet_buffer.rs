//! Packet buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented packets:
//! - `WaitingForHeader`: need at least 12 bytes
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! No packet is ever decoded speculatively: with less than a full header,
//! or less payload than the header declared, `push` simply retains the
//! bytes and reports nothing.

use bytes::BytesMut;

use super::command::{self, Command, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, REQ_MAGIC, RES_MAGIC};
use super::Packet;
use crate::error::{GearmanError, Result};

/// State machine for packet parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete header (need 12 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { command: &'static Command, remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete packets.
///
/// This is the read half of one connection's codec: the client feeds it raw
/// socket reads and drains fully decoded packets. Only response frames
/// (`\0RES` magic) are accepted; everything a client or worker reads off the
/// wire travels server -> client.
pub struct PacketBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum accepted payload size.
    max_payload_size: u32,
}

impl PacketBuffer {
    /// Create a new packet buffer with default settings.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForHeader,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    /// Create a new packet buffer with a custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete packets.
    ///
    /// Returns a vector of complete packets (may be empty if still waiting
    /// for data); fragmented input is buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns an error on a bad magic marker, an unknown command code, a
    /// declared payload above the size cap, or a payload that does not split
    /// into the command's declared fields.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Packet>> {
        self.buffer.extend_from_slice(data);

        let mut packets = Vec::new();
        while let Some(packet) = self.try_extract_one()? {
            packets.push(packet);
        }
        Ok(packets)
    }

    /// Try to extract a single packet from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Packet>> {
        match &self.state {
            State::WaitingForHeader => {
                if self.buffer.len() < HEADER_SIZE {
                    return Ok(None);
                }

                let magic: [u8; 4] = self.buffer[..4].try_into().expect("4 bytes");
                if magic == REQ_MAGIC {
                    return Err(GearmanError::Protocol(
                        "unexpected request magic on inbound stream".to_string(),
                    ));
                }
                if magic != RES_MAGIC {
                    return Err(GearmanError::Protocol(format!(
                        "bad magic marker {:02x?}",
                        magic
                    )));
                }

                let code = u32::from_be_bytes(self.buffer[4..8].try_into().expect("4 bytes"));
                let length = u32::from_be_bytes(self.buffer[8..12].try_into().expect("4 bytes"));

                let cmd = command::by_code(code).ok_or_else(|| {
                    GearmanError::Protocol(format!("unknown command code {}", code))
                })?;

                if length > self.max_payload_size {
                    return Err(GearmanError::Protocol(format!(
                        "payload size {} exceeds maximum {}",
                        length, self.max_payload_size
                    )));
                }

                let _ = self.buffer.split_to(HEADER_SIZE);

                if length == 0 {
                    return Packet::parse(cmd, bytes::Bytes::new()).map(Some);
                }

                self.state = State::WaitingForPayload {
                    command: cmd,
                    remaining: length,
                };
                self.try_extract_one()
            }

            State::WaitingForPayload { command, remaining } => {
                let remaining = *remaining as usize;
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(remaining).freeze();
                let command = *command;
                self.state = State::WaitingForHeader;

                Packet::parse(command, payload).map(Some)
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_response;

    #[test]
    fn test_single_complete_packet() {
        let mut buffer = PacketBuffer::new();
        let bytes = build_response("job_created", &[b"H:lap:1"]).unwrap();

        let packets = buffer.push(&bytes).unwrap();

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].name(), "job_created");
        assert_eq!(packets[0].field_str("handle").unwrap(), "H:lap:1");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_packets_in_one_push() {
        let mut buffer = PacketBuffer::new();

        let mut combined = Vec::new();
        combined.extend_from_slice(&build_response("job_created", &[b"H:1"]).unwrap());
        combined.extend_from_slice(
            &build_response("work_status", &[b"H:1", b"1", b"2"]).unwrap(),
        );
        combined.extend_from_slice(&build_response("work_complete", &[b"H:1", b"done"]).unwrap());

        let packets = buffer.push(&combined).unwrap();

        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].name(), "job_created");
        assert_eq!(packets[1].name(), "work_status");
        assert_eq!(packets[2].name(), "work_complete");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = PacketBuffer::new();
        let bytes = build_response("job_created", &[b"H:1"]).unwrap();

        let packets = buffer.push(&bytes[..5]).unwrap();
        assert!(packets.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");

        let packets = buffer.push(&bytes[5..]).unwrap();
        assert_eq!(packets.len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = PacketBuffer::new();
        let bytes =
            build_response("work_complete", &[b"H:1", b"a longer result payload"]).unwrap();

        let partial = HEADER_SIZE + 6;
        let packets = buffer.push(&bytes[..partial]).unwrap();
        assert!(packets.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let packets = buffer.push(&bytes[partial..]).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(
            &packets[0].field("result").unwrap()[..],
            b"a longer result payload"
        );
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = PacketBuffer::new();
        let bytes = build_response("work_fail", &[b"H:1"]).unwrap();

        let mut all = Vec::new();
        for b in &bytes {
            all.extend(buffer.push(&[*b]).unwrap());
        }

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name(), "work_fail");
    }

    #[test]
    fn test_empty_payload_packet() {
        let mut buffer = PacketBuffer::new();
        let bytes = build_response("no_job", &[]).unwrap();

        let packets = buffer.push(&bytes).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].name(), "no_job");
        assert!(packets[0].fields.is_empty());
    }

    #[test]
    fn test_request_magic_rejected() {
        let mut buffer = PacketBuffer::new();
        let bytes = crate::protocol::build_request("submit_job", &[b"f", b"u", b"a"]).unwrap();

        let err = buffer.push(&bytes).unwrap_err();
        assert!(err.to_string().contains("request magic"));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buffer = PacketBuffer::new();
        let err = buffer.push(b"GARBAGE-HEADER!!").unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_unknown_command_code() {
        let mut buffer = PacketBuffer::new();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&RES_MAGIC);
        bytes.extend_from_slice(&999u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());

        let err = buffer.push(&bytes).unwrap_err();
        assert!(err.to_string().contains("unknown command code"));
    }

    #[test]
    fn test_max_payload_validation() {
        let mut buffer = PacketBuffer::with_max_payload(16);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&RES_MAGIC);
        bytes.extend_from_slice(&13u32.to_be_bytes()); // work_complete
        bytes.extend_from_slice(&1000u32.to_be_bytes());

        let err = buffer.push(&bytes).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = PacketBuffer::new();

        let first = build_response("job_created", &[b"H:1"]).unwrap();
        let second = build_response("work_complete", &[b"H:1", b"out"]).unwrap();

        let mut data = first.to_vec();
        data.extend_from_slice(&second[..7]);

        let packets = buffer.push(&data).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].name(), "job_created");

        let packets = buffer.push(&second[7..]).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].name(), "work_complete");
    }
}
