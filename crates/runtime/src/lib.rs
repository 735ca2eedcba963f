//! Transport layer for dcwatch.
//!
//! [`Transport`] is the request/response + push-event contract the watcher
//! core is written against. Two implementations live here:
//! * [`HttpTransport`]: a Device Connect style manager over HTTP, with
//!   events pushed on a WebSocket
//! * [`fake::FakeTransport`]: an in-memory scripted transport for tests

pub mod error;
pub mod fake;
pub mod http;
pub mod transport;
mod websocket;

pub use error::{Error, Result};
pub use http::{HttpTransport, HttpTransportConfig};
pub use transport::{ChannelListener, EventListener, Transport};
