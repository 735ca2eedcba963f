//! Watch a Device Connect manager for a service that supports a capability
//! path, subscribe to its events, and relay them.
//!
//! # Architecture
//!
//! * [`path`]: parse `/{api}/{profile}[/{interface}][/{attribute}]`
//! * [`gate`]: wait until the manager is up
//! * [`discovery`] and [`probe`]: find the first registered service whose
//!   manifest supports the path
//! * [`channel`]: own the event channel and its subscription
//! * [`relay`]: fan events and progress out to consumers
//! * [`session`]: run all of the above as one cancellable worker
//!
//! All network access goes through [`dc_runtime::Transport`]; tests use
//! [`dc_runtime::fake::FakeTransport`].

pub mod backoff;
pub mod channel;
pub mod discovery;
pub mod error;
pub mod gate;
pub mod path;
pub mod probe;
pub mod relay;
pub mod session;

pub use backoff::{Backoff, Outcome, PollPolicy};
pub use channel::{ChannelState, EventChannel, SubscriptionHandle};
pub use discovery::{ServiceDescriptor, find_service};
pub use error::{Error, Result};
pub use gate::await_available;
pub use path::PathSpec;
pub use probe::supports;
pub use relay::{EventRelay, Notification};
pub use session::{SessionConfig, SessionController};
