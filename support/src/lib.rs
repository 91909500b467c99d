#![allow(clippy::new_without_default)]

//! Ambient infrastructure shared by every TBNF crate: structured logging and time helpers.
//! Kept deliberately small — TBNF has no authentication or crypto surface beyond identifying
//! a client by hardware address, so the cryptographic and session machinery that used to live
//! here was dropped (see the root DESIGN.md).

pub mod logging;
pub mod time;
