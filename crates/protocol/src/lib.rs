//! Wire types for the Chrome DevTools Protocol (CDP).
//!
//! This crate contains the serde-serializable types exchanged with a
//! remote-debugging Chromium: the JSON-RPC style envelopes sent over the
//! page WebSocket, the discovery payloads served over plain HTTP, and the
//! handful of domain methods the renderer drives.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with protocol: Field names follow the CDP JSON schema
//! * Minimal: Only the methods pagecast actually calls are modelled
//!
//! Connection handling and request correlation live in `pagecast-runtime`.

pub mod discovery;
pub mod message;
pub mod page;
pub mod runtime;

pub use discovery::*;
pub use message::*;
pub use page::*;
pub use runtime::*;
