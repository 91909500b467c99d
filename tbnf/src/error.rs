//! Error kinds surfaced by the framing and registration layers.
//!
//! Per the framework's error-handling design, network and protocol failures at the endpoint
//! boundary are never exceptions: they collapse to `bool`/`Option` results and lifecycle
//! events (see [`crate::net::endpoint`]). The types here are reserved for the handful of
//! failures that *are* programmer errors — duplicate tag or handler registration, and an
//! oversize frame the caller must not have attempted to send.

use thiserror::Error;

/// Failures from the [`crate::registry::MessageRegistry`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RegistryError {
    /// An implementation attempted to register the same variant twice under different tags.
    #[error("variant `{0}` is already registered under a different tag")]
    DuplicateTag(&'static str),
}

/// Failures from [`crate::dispatch::HandlerDispatch`] construction.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum DispatchError {
    /// Two handlers (or a handler and an ignored-variant sink) were bound to the same tag.
    #[error("a handler is already bound for type tag {0}")]
    DuplicateHandler(u16),
}

/// Failures from packing/unpacking a single message into a frame.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum CodecError {
    /// `Unpack` was asked to decode a frame into a variant whose tag does not match the
    /// frame's leading `TypeTag`.
    #[error("frame tag {frame} does not match target variant tag {target}")]
    TagMismatch { frame: u16, target: u16 },
    /// A packed message exceeded the 65535-byte frame ceiling (including its type tag).
    #[error("packed frame size {0} exceeds the 65535 byte maximum")]
    FrameTooLarge(usize),
    /// The payload bytes did not parse as the expected shape (truncated string, bad varint…).
    #[error("malformed payload: {0}")]
    Malformed(&'static str),
}
