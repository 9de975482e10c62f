use std::io::{self, BufReader};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::frame::{Frame, FrameKind, Status};
use crate::queue::EventQueue;
use crate::types::{Notification, Reply, Request};

/// Port used when the caller asks for port 0.
pub const DEFAULT_PORT: u16 = 5084;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Status and description of the most recent failed operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub status: Status,
    pub description: String,
}

impl Default for ErrorInfo {
    fn default() -> ErrorInfo {
        ErrorInfo {
            status: Status::Success,
            description: "No error".to_string(),
        }
    }
}

/// The capability interface of a reader service.
pub trait Reader {
    /// Sends one request and blocks until the reader answers it.
    fn issue(&mut self, request: Request) -> Result<Reply, Error>;

    fn last_error(&self) -> ErrorInfo;

    /// The queue that notifications from this reader are buffered in.
    fn event_queue(&self) -> Weak<EventQueue>;

    fn disconnect(self)
    where
        Self: Sized;
}

/// An open connection to a reader service.
pub struct Session {
    peer: SocketAddr,
    stream: TcpStream,
    replies: Receiver<Frame>,
    events: Arc<EventQueue>,
    listener: Option<JoinHandle<()>>,
    last_error: ErrorInfo,
}

impl Session {
    /// Connects and performs the handshake. Port 0 selects [`DEFAULT_PORT`].
    pub fn connect(host: &str, port: u16) -> Result<Session, Error> {
        let port = if port == 0 { DEFAULT_PORT } else { port };
        let target = format!("{}:{}", host, port);
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::connection(&target, e))?;

        let mut last_failure = None;
        for addr in addrs {
            debug!(%addr, "connecting to reader");
            match TcpStream::connect(addr) {
                Ok(stream) => return Session::handshake(addr, stream),
                Err(e) => last_failure = Some(e),
            }
        }
        Err(match last_failure {
            Some(e) => Error::connection(&target, e),
            None => Error::connection(&target, "host did not resolve to any address"),
        })
    }

    fn handshake(peer: SocketAddr, mut stream: TcpStream) -> Result<Session, Error> {
        let failed = |e: Error| Error::connection(peer, e);
        stream
            .set_read_timeout(Some(HANDSHAKE_TIMEOUT))
            .map_err(|e| failed(e.into()))?;
        Frame::hello().write_to(&mut stream).map_err(failed)?;
        let greeting = Frame::read_from(&mut stream).map_err(failed)?;
        if greeting.kind != FrameKind::Hello {
            return Err(Error::connection(
                peer,
                format!("expected handshake reply, got {:?} frame", greeting.kind),
            ));
        }
        let status = greeting.status().map_err(failed)?;
        if status != Status::Success {
            return Err(Error::refused(
                &peer,
                status,
                &String::from_utf8_lossy(&greeting.payload),
            ));
        }
        stream.set_read_timeout(None).map_err(|e| failed(e.into()))?;
        stream.set_nodelay(true).map_err(|e| failed(e.into()))?;

        let receive = stream.try_clone().map_err(|e| failed(e.into()))?;
        let events = Arc::new(EventQueue::new());
        let (replies_tx, replies) = mpsc::channel();
        let listener = {
            let events = events.clone();
            thread::Builder::new()
                .name("rfid-listener".to_string())
                .spawn(move || listen(receive, replies_tx, &events))
                .map_err(|e| failed(e.into()))?
        };
        info!(%peer, "connected to reader");

        Ok(Session {
            peer,
            stream,
            replies,
            events,
            listener: Some(listener),
            last_error: ErrorInfo::default(),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn exchange(&mut self, request: &Request) -> Result<Reply, Error> {
        Frame::encode(FrameKind::Request, request.command().into(), request)?
            .write_to(&mut self.stream)?;
        let response = self.replies.recv().map_err(|_| {
            Error::Io(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "connection to the reader was lost",
            ))
        })?;
        match response.status()? {
            Status::Success => Ok(bincode::deserialize(&response.payload)?),
            status if response.payload.is_empty() => Err(status.into()),
            status => Err(Error::Operation {
                status,
                reason: String::from_utf8_lossy(&response.payload).into_owned(),
            }),
        }
    }

    fn teardown(&mut self) {
        self.events.close("session disconnected");
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(listener) = self.listener.take() {
            if listener.join().is_err() {
                warn!(peer = %self.peer, "listener thread panicked");
            }
        }
    }
}

impl Reader for Session {
    fn issue(&mut self, request: Request) -> Result<Reply, Error> {
        let command = request.command();
        debug!(?command, "issuing command");
        let result = self.exchange(&request);
        if let Err(e) = &result {
            debug!(?command, error = %e, "command failed");
            self.last_error = ErrorInfo {
                status: e.status().unwrap_or(Status::CommunicationError),
                description: e.to_string(),
            };
        }
        result
    }

    fn last_error(&self) -> ErrorInfo {
        self.last_error.clone()
    }

    fn event_queue(&self) -> Weak<EventQueue> {
        Arc::downgrade(&self.events)
    }

    fn disconnect(mut self) {
        info!(peer = %self.peer, "disconnecting from reader");
        self.teardown();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.listener.is_some() {
            self.teardown();
        }
    }
}

/// Receive side of the connection: routes responses to the session and
/// buffers notifications until the event worker picks them up.
fn listen(stream: TcpStream, replies: Sender<Frame>, events: &EventQueue) {
    let mut stream = BufReader::new(stream);
    let reason = loop {
        match Frame::read_from(&mut stream) {
            Ok(frame) => match frame.kind {
                FrameKind::Response => {
                    if replies.send(frame).is_err() {
                        break "session dropped".to_string();
                    }
                }
                FrameKind::Event => match bincode::deserialize::<Notification>(&frame.payload) {
                    Ok(notification) => events.push(notification),
                    Err(e) => warn!(error = %e, "discarding undecodable notification"),
                },
                kind => warn!(?kind, "ignoring unexpected frame"),
            },
            Err(Error::Io(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                break "connection closed by the reader".to_string();
            }
            Err(e) => break e.to_string(),
        }
    };
    debug!(%reason, "listener exiting");
    events.close(reason);
}
