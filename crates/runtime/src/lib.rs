//! Runtime plumbing for driving a remote-debugging Chromium.
//!
//! * [`browser_finder`] locates a Chrome/Chromium executable.
//! * [`process`] holds pid, port and process-group helpers.
//! * [`cdp_probe`] talks to the HTTP discovery endpoint (`/json/*`).
//! * [`transport`] and [`connection`] carry CDP commands over a WebSocket and
//!   correlate responses with pending requests.
//! * [`fake_transport`] is an in-memory transport for tests.

pub mod browser_finder;
pub mod cdp_probe;
pub mod connection;
pub mod error;
pub mod fake_transport;
pub mod process;
pub mod transport;

pub use connection::Connection;
pub use error::{Error, Result};
pub use transport::{Transport, TransportParts, TransportReceiver, WebSocketTransport};
