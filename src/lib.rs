//! Console driver for network-attached UHF RFID readers.
//!
//! A [`Session`] talks to the reader service over TCP. Notifications the
//! reader pushes (tag reads, antenna and GPI changes, ...) are buffered by the
//! session and handed to a handler by [`EventDelivery`]. The [`menu`] module
//! drives both from a text console.

pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod menu;
pub mod ops;
pub mod queue;
pub mod session;
pub mod types;

pub use crate::config::{Config, SessionState};
pub use crate::error::Error;
pub use crate::events::{DeliveryMode, EventDelivery};
pub use crate::frame::{CommandType, Frame, FrameKind, Status};
pub use crate::menu::Console;
pub use crate::ops::ReaderOps;
pub use crate::session::{ErrorInfo, Reader, Session, DEFAULT_PORT};
pub use crate::types::{Notification, Reply, Request};
