//! Packet struct with named-field access, plus request/response builders.
//!
//! A decoded packet pairs its command-table entry with the payload split
//! into fields. Payload slices are `bytes::Bytes` views into the read
//! buffer, so field access never copies.
//!
//! # Example
//!
//! ```
//! use gearman_client::protocol::{build_request, Packet};
//! use gearman_client::protocol::command;
//!
//! let bytes = build_request("submit_job", &[b"reverse", b"uniq-1", b"abc"]).unwrap();
//! assert_eq!(&bytes[..4], b"\0REQ");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::command::{self, Command, HEADER_SIZE, REQ_MAGIC, RES_MAGIC};
use crate::error::{GearmanError, Result};

/// A complete decoded protocol packet.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Command-table entry this packet was decoded against.
    pub command: &'static Command,
    /// Field values, in the command's declared order (zero-copy slices).
    pub fields: Vec<Bytes>,
}

impl Packet {
    /// Split a raw payload into fields per the command's field list.
    ///
    /// The first `arity - 1` fields end at NUL separators; the final field
    /// is the remainder of the payload, raw (it may itself contain NULs).
    pub fn parse(command: &'static Command, payload: Bytes) -> Result<Self> {
        let arity = command.fields.len();
        let mut fields = Vec::with_capacity(arity);

        if arity == 0 {
            if !payload.is_empty() {
                return Err(GearmanError::Protocol(format!(
                    "{} packet carries unexpected payload",
                    command.name
                )));
            }
            return Ok(Self { command, fields });
        }

        let mut rest = payload;
        for _ in 0..arity - 1 {
            match rest.iter().position(|&b| b == 0) {
                Some(pos) => {
                    fields.push(rest.slice(..pos));
                    rest = rest.slice(pos + 1..);
                }
                None => {
                    return Err(GearmanError::Protocol(format!(
                        "{} packet is missing fields",
                        command.name
                    )))
                }
            }
        }
        fields.push(rest);

        Ok(Self { command, fields })
    }

    /// Get the wire name of this packet's command.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.command.name
    }

    /// Get a field by its declared name.
    pub fn field(&self, name: &str) -> Option<&Bytes> {
        self.command
            .fields
            .iter()
            .position(|&f| f == name)
            .and_then(|i| self.fields.get(i))
    }

    /// Get a field as UTF-8 text.
    pub fn field_str(&self, name: &str) -> Result<&str> {
        let bytes = self.field(name).ok_or_else(|| {
            GearmanError::Protocol(format!("{} packet has no {:?} field", self.name(), name))
        })?;
        std::str::from_utf8(bytes).map_err(|_| {
            GearmanError::Protocol(format!(
                "{} field of {} packet is not valid UTF-8",
                name,
                self.name()
            ))
        })
    }

    /// Get a field as an unsigned integer.
    pub fn field_u64(&self, name: &str) -> Result<u64> {
        let text = self.field_str(name)?;
        text.parse().map_err(|_| {
            GearmanError::Protocol(format!(
                "{} field of {} packet is not an integer: {:?}",
                name,
                self.name(),
                text
            ))
        })
    }
}

/// Build a request frame (`\0REQ` magic) for the named command.
pub fn build_request(command_name: &str, fields: &[&[u8]]) -> Result<Bytes> {
    let cmd = command::by_name(command_name)
        .ok_or_else(|| GearmanError::Protocol(format!("unknown command {:?}", command_name)))?;
    build(REQ_MAGIC, cmd, fields)
}

/// Build a response frame (`\0RES` magic) for the named command.
///
/// Servers are the only party that emits these in production; the builder
/// exists for worker/test harnesses scripting the server side of a socket.
pub fn build_response(command_name: &str, fields: &[&[u8]]) -> Result<Bytes> {
    let cmd = command::by_name(command_name)
        .ok_or_else(|| GearmanError::Protocol(format!("unknown command {:?}", command_name)))?;
    build(RES_MAGIC, cmd, fields)
}

fn build(magic: [u8; 4], cmd: &'static Command, fields: &[&[u8]]) -> Result<Bytes> {
    if fields.len() != cmd.fields.len() {
        return Err(GearmanError::Protocol(format!(
            "{} expects {} fields, got {}",
            cmd.name,
            cmd.fields.len(),
            fields.len()
        )));
    }
    // NUL is the separator; only the final field may contain it.
    for (i, f) in fields.iter().enumerate() {
        if i + 1 < fields.len() && f.contains(&0) {
            return Err(GearmanError::Protocol(format!(
                "{} field {:?} contains NUL",
                cmd.name, cmd.fields[i]
            )));
        }
    }

    let payload_len: usize =
        fields.iter().map(|f| f.len()).sum::<usize>() + fields.len().saturating_sub(1);

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload_len);
    buf.extend_from_slice(&magic);
    buf.extend_from_slice(&cmd.code.to_be_bytes());
    buf.extend_from_slice(&(payload_len as u32).to_be_bytes());
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            buf.put_u8(0);
        }
        buf.extend_from_slice(f);
    }
    Ok(buf.freeze())
}
