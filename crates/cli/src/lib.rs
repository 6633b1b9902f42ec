//! Process entrypoint pieces for the `pagecast` binary.

pub mod app;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod settings;
pub mod signals;
