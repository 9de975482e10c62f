use std::io;
use std::net::SocketAddr;

use failure::Fail;

use crate::Status;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "I/O error: {}", _0)]
    Io(#[cause] io::Error),

    #[fail(display = "could not connect to {}: {}", address, reason)]
    Connection { address: String, reason: String },

    #[fail(display = "{}", reason)]
    Operation { status: Status, reason: String },

    #[fail(display = "invalid input: {}", _0)]
    Input(String),

    #[fail(display = "event worker stopped: {}", _0)]
    WorkerFault(String),

    #[fail(display = "protocol error: {}", _0)]
    Protocol(String),

    #[fail(display = "payload encoding error: {}", _0)]
    Codec(#[cause] bincode::Error),

    #[fail(display = "{}", _0)]
    Program(String),
}

impl Error {
    pub(crate) fn connection(address: impl ToString, reason: impl ToString) -> Error {
        Error::Connection {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn refused(address: &SocketAddr, status: Status, reason: &str) -> Error {
        Error::connection(address, format!("handshake rejected ({:?}): {}", status, reason))
    }

    /// Status carried by the error, if it came back from the reader.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::Operation { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Error {
        Error::Codec(e)
    }
}

impl From<String> for Error {
    fn from(e: String) -> Error {
        Error::Program(e)
    }
}

impl From<Status> for Error {
    fn from(e: Status) -> Error {
        let reason = match e {
            Status::InvalidParameter => "Parameter error",
            Status::NotSupported => "Command not supported by the reader",
            Status::ReaderBusy => "Reader is busy",
            Status::NoTagsFound => "No tags found",
            Status::AccessFailed => "Tag access failed",
            Status::ConfigFailed => "Configuration rejected",
            Status::CommunicationError => "Communication with the reader failed",
            Status::Rejected => "Request rejected",
            Status::Success => "Success",
        };
        Error::Operation {
            status: e,
            reason: reason.to_string(),
        }
    }
}
