//! Wire types for the Device Connect manager API.
//!
//! This crate contains the serde-serializable shapes exchanged with a
//! Device Connect style manager over HTTP and its event WebSocket.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and
//!   trivial accessors
//! * 1:1 with the wire: field names follow the manager's JSON
//! * Stable: Changes only when the wire format changes
//!
//! Discovery, matching, and session logic live in `dcwatch`.

pub mod event;
pub mod manifest;
pub mod result;
pub mod service;
pub mod target;

pub use event::*;
pub use manifest::*;
pub use result::*;
pub use service::*;
pub use target::*;
