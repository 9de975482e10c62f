//! Framing for the reader service transport.
//!
//! Every message on the wire is a frame:
//!
//! ```text
//! | len: u16 LE | kind: u8 | code: u8 | payload ... | crc: u16 LE |
//! ```
//!
//! `len` counts every byte after the length field. The CRC is
//! CRC-16/MCRF4XX over everything before it, length included.

use std::convert::TryFrom;
use std::io::{Read, Write};

use crc16::{State, MCRF4XX};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

use crate::error::Error;

/// Bytes of a frame that are not payload, excluding the length field.
const OVERHEAD: usize = 4;

pub const MAX_PAYLOAD: usize = u16::MAX as usize - OVERHEAD;

/// Version sent in the connect handshake.
pub const PROTOCOL_VERSION: u8 = 1;

#[derive(Copy, Clone, PartialEq, Eq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FrameKind {
    Hello = 0x00,
    Request = 0x01,
    Response = 0x02,
    Event = 0x03,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    InvalidParameter = 0x01,
    NotSupported = 0x02,
    ReaderBusy = 0x03,
    NoTagsFound = 0x04,
    AccessFailed = 0x05,
    ConfigFailed = 0x06,
    CommunicationError = 0x07,
    Rejected = 0x08,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandType {
    GetCapabilities = 0x01,
    GetTagStorageSettings = 0x02,
    SetTagStorageSettings = 0x03,
    GetSingulationControl = 0x04,
    SetSingulationControl = 0x05,
    SetGpo = 0x06,
    GetGpi = 0x07,
    EnableGpi = 0x08,
    GetAntennaConfig = 0x09,
    SetAntennaConfig = 0x0A,
    GetRfMode = 0x0B,
    SetRfMode = 0x0C,
    StartInventory = 0x10,
    StopInventory = 0x11,
    AddPreFilter = 0x12,
    RemovePreFilter = 0x13,
    ReadTag = 0x20,
    WriteTag = 0x21,
    LockTag = 0x22,
    KillTag = 0x23,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Frame {
    pub kind: FrameKind,
    pub code: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(kind: FrameKind, code: u8, payload: Vec<u8>) -> Frame {
        Frame {
            kind,
            code,
            payload,
        }
    }

    pub fn hello() -> Frame {
        Frame::new(FrameKind::Hello, PROTOCOL_VERSION, Vec::new())
    }

    /// Frame whose payload is the bincode encoding of `value`.
    pub fn encode<T: Serialize>(kind: FrameKind, code: u8, value: &T) -> Result<Frame, Error> {
        Ok(Frame::new(kind, code, bincode::serialize(value)?))
    }

    /// Response frame carrying `status`.
    pub fn response(status: Status, payload: Vec<u8>) -> Frame {
        Frame::new(FrameKind::Response, status.into(), payload)
    }

    pub fn status(&self) -> Result<Status, Error> {
        Status::try_from(self.code)
            .map_err(|_| Error::Protocol(format!("unknown status code {:#04x}", self.code)))
    }

    fn crc(data: &[u8]) -> u16 {
        State::<MCRF4XX>::calculate(data)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(Error::Protocol(format!(
                "payload of {} bytes exceeds the frame limit",
                self.payload.len()
            )));
        }
        let len = (self.payload.len() + OVERHEAD) as u16;
        let mut pkt: Vec<u8> = Vec::with_capacity(len as usize + 2);
        pkt.extend_from_slice(&len.to_le_bytes());
        pkt.push(self.kind.into());
        pkt.push(self.code);
        pkt.extend_from_slice(&self.payload);
        let crc = Frame::crc(&pkt);
        pkt.extend_from_slice(&crc.to_le_bytes());
        Ok(pkt)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Frame, Error> {
        if bytes.len() < OVERHEAD + 2 {
            return Err(Error::Protocol(format!("frame too short: {} bytes", bytes.len())));
        }
        let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        if len != bytes.len() - 2 {
            return Err(Error::Protocol(format!(
                "length field says {} bytes, frame has {}",
                len,
                bytes.len() - 2
            )));
        }
        let (body, crc) = bytes.split_at(bytes.len() - 2);
        let expected = u16::from_le_bytes([crc[0], crc[1]]);
        let actual = Frame::crc(body);
        if expected != actual {
            return Err(Error::Protocol(format!(
                "CRC mismatch: frame says {:#06x}, computed {:#06x}",
                expected, actual
            )));
        }
        let kind = FrameKind::try_from(body[2])
            .map_err(|_| Error::Protocol(format!("unknown frame kind {:#04x}", body[2])))?;
        Ok(Frame {
            kind,
            code: body[3],
            payload: body[4..].to_vec(),
        })
    }

    /// Reads one frame, blocking until it is complete.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Frame, Error> {
        let mut len = [0u8; 2];
        reader.read_exact(&mut len)?;
        let body_len = u16::from_le_bytes(len) as usize;
        if body_len < OVERHEAD {
            return Err(Error::Protocol(format!("invalid frame length {}", body_len)));
        }
        let mut frame: Vec<u8> = Vec::with_capacity(body_len + 2);
        frame.extend_from_slice(&len);
        reader.by_ref().take(body_len as u64).read_to_end(&mut frame)?;
        if frame.len() != body_len + 2 {
            return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        Frame::from_bytes(&frame)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        writer.write_all(&self.to_bytes()?)?;
        writer.flush()?;
        Ok(())
    }
}
