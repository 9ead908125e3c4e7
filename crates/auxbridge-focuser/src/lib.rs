//! Celestron focuser control over the AUX bus.
//!
//! - [`Focuser`] wraps a [`Communicator`](auxbridge_link::Communicator) with
//!   typed focuser commands: version, position, goto, continuous moves,
//!   stop, completion polling and backlash.
//! - [`FocuserService`] runs a task that owns the focuser, tracks its
//!   [`FocuserState`] and publishes [`FocuserEvent`]s. Any number of
//!   [`FocuserHandle`] clones can issue commands; the task serializes them.
//!
//! # Example
//!
//! ```rust,ignore
//! use auxbridge_focuser::{Focuser, FocuserConfig, FocuserService};
//! use auxbridge_link::{Communicator, StreamTransport};
//!
//! let config = FocuserConfig::default();
//! let transport = StreamTransport::connect("192.168.4.1:2000").await?;
//! let focuser = Focuser::new(Communicator::with_config(transport, config.link.clone()));
//!
//! let (handle, _task) = FocuserService::spawn(focuser, config);
//! handle.connect().await?;
//! handle.goto(12_000).await?;
//! ```

mod config;
mod error;
mod focuser;
mod service;
mod state;

pub use config::*;
pub use error::*;
pub use focuser::*;
pub use service::*;
pub use state::*;
