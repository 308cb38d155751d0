//! Settings wire format
//!
//! Settings requests and responses ride inside endpoint payloads. The
//! first byte selects the operation and string fields follow, each
//! NUL-terminated:
//!
//! ```text
//! read      01 section 00 name 00
//! write     02 section 00 name 00 value 00
//! value     81 section 00 name 00 value 00
//! status    82 code
//! ```
//!
//! Interior NULs are not representable; fields are plain UTF-8 text.

use crate::error::{FabricError, Result};
use bytes::Bytes;

/// Read request opcode
pub const OP_READ: u8 = 0x01;
/// Write request opcode
pub const OP_WRITE: u8 = 0x02;
/// Value response opcode
pub const OP_VALUE: u8 = 0x81;
/// Status response opcode
pub const OP_STATUS: u8 = 0x82;

/// A settings request, as sent by a REQ client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Read the current value of a setting
    Read { section: String, name: String },
    /// Write a new value to a setting
    Write {
        section: String,
        name: String,
        value: String,
    },
}

/// A settings response, as sent by the REP service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Successful read
    Value {
        section: String,
        name: String,
        value: String,
    },
    /// Write result or read failure
    Status(Status),
}

/// Outcome codes carried by [`Response::Status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation succeeded
    Ok,
    /// No setting is registered under the requested section and name
    UnknownSetting,
    /// The value failed the setting's kind validation
    InvalidValue,
    /// The request could not be parsed
    Malformed,
}

impl Status {
    /// Wire byte for this status
    pub fn as_byte(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::UnknownSetting => 1,
            Status::InvalidValue => 2,
            Status::Malformed => 3,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Status::Ok),
            1 => Ok(Status::UnknownSetting),
            2 => Ok(Status::InvalidValue),
            3 => Ok(Status::Malformed),
            other => Err(FabricError::Codec(format!("unknown status code {other}"))),
        }
    }
}

fn put_field(buf: &mut Vec<u8>, field: &str) {
    buf.extend_from_slice(field.as_bytes());
    buf.push(0);
}

/// Split `body` into exactly `N` NUL-terminated UTF-8 fields
fn fields<const N: usize>(body: &[u8]) -> Result<[String; N]> {
    match body.last() {
        Some(0) => {}
        _ => return Err(FabricError::Codec("missing field terminator".to_string())),
    }
    let mut out = Vec::with_capacity(N);
    for raw in body[..body.len() - 1].split(|&b| b == 0) {
        let field = std::str::from_utf8(raw)
            .map_err(|_| FabricError::Codec("field is not valid UTF-8".to_string()))?;
        out.push(field.to_string());
    }
    let count = out.len();
    out.try_into()
        .map_err(|_| FabricError::Codec(format!("expected {N} fields, got {count}")))
}

/// Encode a request payload
pub fn encode_request(request: &Request) -> Bytes {
    let mut buf = Vec::new();
    match request {
        Request::Read { section, name } => {
            buf.push(OP_READ);
            put_field(&mut buf, section);
            put_field(&mut buf, name);
        }
        Request::Write {
            section,
            name,
            value,
        } => {
            buf.push(OP_WRITE);
            put_field(&mut buf, section);
            put_field(&mut buf, name);
            put_field(&mut buf, value);
        }
    }
    Bytes::from(buf)
}

/// Decode a request payload
pub fn decode_request(payload: &[u8]) -> Result<Request> {
    let (&op, body) = payload
        .split_first()
        .ok_or_else(|| FabricError::Codec("empty message".to_string()))?;
    match op {
        OP_READ => {
            let [section, name] = fields::<2>(body)?;
            Ok(Request::Read { section, name })
        }
        OP_WRITE => {
            let [section, name, value] = fields::<3>(body)?;
            Ok(Request::Write {
                section,
                name,
                value,
            })
        }
        other => Err(FabricError::Codec(format!(
            "unknown request opcode 0x{other:02x}"
        ))),
    }
}

/// Encode a response payload
pub fn encode_response(response: &Response) -> Bytes {
    let mut buf = Vec::new();
    match response {
        Response::Value {
            section,
            name,
            value,
        } => {
            buf.push(OP_VALUE);
            put_field(&mut buf, section);
            put_field(&mut buf, name);
            put_field(&mut buf, value);
        }
        Response::Status(status) => {
            buf.push(OP_STATUS);
            buf.push(status.as_byte());
        }
    }
    Bytes::from(buf)
}

/// Decode a response payload
pub fn decode_response(payload: &[u8]) -> Result<Response> {
    let (&op, body) = payload
        .split_first()
        .ok_or_else(|| FabricError::Codec("empty message".to_string()))?;
    match op {
        OP_VALUE => {
            let [section, name, value] = fields::<3>(body)?;
            Ok(Response::Value {
                section,
                name,
                value,
            })
        }
        OP_STATUS => match body {
            [code] => Ok(Response::Status(Status::from_byte(*code)?)),
            _ => Err(FabricError::Codec(
                "status body must be exactly one byte".to_string(),
            )),
        },
        other => Err(FabricError::Codec(format!(
            "unknown response opcode 0x{other:02x}"
        ))),
    }
}
