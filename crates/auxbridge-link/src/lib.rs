//! Reliable command exchange over an AUX serial link.
//!
//! This crate drives the request/response cycle on top of the frame codec in
//! `auxbridge-protocol`:
//!
//! - [`AuxTransport`] is the byte channel the link needs, with
//!   [`StreamTransport`] adapting any tokio stream to it.
//! - [`FrameReceiver`] turns a raw byte stream into frames by waiting for the
//!   line to go quiet, restoring a dropped start byte if necessary.
//! - [`Communicator`] sends a request, receives and validates the response,
//!   and retries up to a fixed bound.
//!
//! # Usage contract
//!
//! Responses are matched to requests purely by order. A transport must be
//! used by one exchange at a time; concurrent callers have to be serialized
//! by a single owner of the [`Communicator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use auxbridge_link::{Communicator, StreamTransport};
//! use auxbridge_protocol::{Command, Target};
//!
//! let transport = StreamTransport::connect("192.168.4.1:2000").await?;
//! let mut aux = Communicator::new(transport);
//! let version = aux.query(Target::Focuser, Command::GetVersion).await?;
//! ```

mod communicator;
mod config;
mod error;
mod receiver;
mod transport;

pub use communicator::*;
pub use config::*;
pub use error::*;
pub use receiver::*;
pub use transport::*;
