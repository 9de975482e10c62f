//! Fake reader service for integration tests.
//!
//! Listens on a loopback port, answers the handshake, and hands every
//! request to a closure that decides the response. The closure also gets the
//! socket so it can push notifications before answering.

#![allow(dead_code)]

use std::net::{TcpListener, TcpStream};
use std::sync::Once;
use std::thread::{self, JoinHandle};

use tracing::Level;

use rfid_console::types::ReaderCapabilities;
use rfid_console::{Frame, FrameKind, Notification, Reply, Request, Status};

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}

pub enum Greeting {
    Accept,
    Reject(&'static str),
}

pub struct FakeReader {
    pub port: u16,
    handle: JoinHandle<Vec<Request>>,
}

impl FakeReader {
    pub fn spawn<F>(greeting: Greeting, mut respond: F) -> FakeReader
    where
        F: FnMut(&Request, &mut TcpStream) -> Frame + Send + 'static,
    {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut requests = Vec::new();

            let hello = Frame::read_from(&mut stream).unwrap();
            assert_eq!(hello.kind, FrameKind::Hello);
            let reply = match &greeting {
                Greeting::Accept => Frame::new(FrameKind::Hello, Status::Success.into(), Vec::new()),
                Greeting::Reject(reason) => Frame::new(
                    FrameKind::Hello,
                    Status::Rejected.into(),
                    reason.as_bytes().to_vec(),
                ),
            };
            reply.write_to(&mut stream).unwrap();
            if let Greeting::Reject(_) = greeting {
                return requests;
            }

            while let Ok(frame) = Frame::read_from(&mut stream) {
                assert_eq!(frame.kind, FrameKind::Request);
                let request: Request = bincode::deserialize(&frame.payload).unwrap();
                assert_eq!(u8::from(request.command()), frame.code);
                let response = respond(&request, &mut stream);
                requests.push(request);
                if response.write_to(&mut stream).is_err() {
                    break;
                }
            }
            requests
        });
        FakeReader { port, handle }
    }

    /// Waits for the client to hang up and returns the requests it sent.
    pub fn finish(self) -> Vec<Request> {
        self.handle.join().unwrap()
    }
}

pub fn ok(reply: &Reply) -> Frame {
    Frame::encode(FrameKind::Response, Status::Success.into(), reply).unwrap()
}

pub fn done() -> Frame {
    ok(&Reply::Done)
}

pub fn fail(status: Status, reason: &str) -> Frame {
    Frame::response(status, reason.as_bytes().to_vec())
}

pub fn push(stream: &mut TcpStream, notification: &Notification) {
    Frame::encode(FrameKind::Event, 0, notification)
        .unwrap()
        .write_to(stream)
        .unwrap();
}

pub fn capabilities() -> ReaderCapabilities {
    ReaderCapabilities {
        reader_id: "84:24:8D:EE:01:02".to_string(),
        model: "FX9600".to_string(),
        firmware_version: "3.10.30".to_string(),
        antenna_count: 8,
        gpi_count: 4,
        gpo_count: 4,
        max_prefilters: 2,
        rf_mode_count: 32,
        transmit_power_levels: vec![1000, 1100, 1200, 3000],
    }
}
