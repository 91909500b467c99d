//! Networking: framing, queuing, and the three endpoint flavors built on top of them (§4).

pub mod authenticator;
pub mod client;
pub mod endpoint;
pub mod frame;
pub mod latch;
pub mod queue;
pub mod remote;

pub use endpoint::{EndpointHandle, Handshake, LifecycleHooks};
