//! Message variants: the payload schemas carried inside a [`crate::registry::PackagedFrame`].
//!
//! A variant is any type implementing [`WireMessage`]. The three built-in system messages
//! live here; user-defined variants are ordinary structs implementing the same trait and
//! handed to [`crate::registry::MessageRegistry::build`] alongside them.

use crate::error::CodecError;
use std::any::Any;
use std::fmt;
use std::io::{Read, Write};

/// Who is allowed to originate a given variant. Purely a development-time guard: nothing in
/// the wire format encodes it, and the framework does not enforce it against a hostile peer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PermittedAuthor {
    Client,
    Host,
    ClientOrHost,
}

/// A registrable message variant: a payload schema plus its (de)serialization routines.
///
/// `CANONICAL_NAME` must be a fully-qualified, stable identifier — it is the sort key the
/// registry uses to assign identical type tags on both peers (see [`crate::registry`]).
pub trait WireMessage: Any + Send + Sync + fmt::Debug + 'static {
    /// Fully-qualified name, used only to order registration deterministically.
    const CANONICAL_NAME: &'static str;
    /// Development-time authorship guard.
    const AUTHOR: PermittedAuthor;

    /// Serialize the payload (the type tag itself is written by the codec, not here).
    fn write_payload(&self, w: &mut dyn Write) -> Result<(), CodecError>;

    /// Deserialize a fresh instance of this variant from its payload bytes.
    fn read_payload(r: &mut dyn Read) -> Result<Self, CodecError>
    where
        Self: Sized;
}

/// Sent by a client immediately after connecting, carrying its hardware-address identity.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IdentificationMessage {
    pub hardware_address: [u8; 6],
}

impl WireMessage for IdentificationMessage {
    const CANONICAL_NAME: &'static str = "tbnf::message::IdentificationMessage";
    const AUTHOR: PermittedAuthor = PermittedAuthor::Client;

    fn write_payload(&self, w: &mut dyn Write) -> Result<(), CodecError> {
        w.write_all(&self.hardware_address)
            .map_err(|_| CodecError::Malformed("failed writing identification payload"))
    }

    fn read_payload(r: &mut dyn Read) -> Result<Self, CodecError> {
        let mut hardware_address = [0u8; 6];
        r.read_exact(&mut hardware_address)
            .map_err(|_| CodecError::Malformed("truncated identification payload"))?;
        Ok(IdentificationMessage { hardware_address })
    }
}

/// Sent by the host in reply to identification, carrying the assigned `NetworkIdentifier`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LoginConfirmationMessage {
    pub network_identifier: u8,
}

impl WireMessage for LoginConfirmationMessage {
    const CANONICAL_NAME: &'static str = "tbnf::message::LoginConfirmationMessage";
    const AUTHOR: PermittedAuthor = PermittedAuthor::Host;

    fn write_payload(&self, w: &mut dyn Write) -> Result<(), CodecError> {
        w.write_all(&[self.network_identifier])
            .map_err(|_| CodecError::Malformed("failed writing login confirmation payload"))
    }

    fn read_payload(r: &mut dyn Read) -> Result<Self, CodecError> {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte)
            .map_err(|_| CodecError::Malformed("truncated login confirmation payload"))?;
        Ok(LoginConfirmationMessage { network_identifier: byte[0] })
    }
}

/// Zero-payload probe injected by the send loop to force traffic on an idle connection.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct InactivityCheckMessage;

impl WireMessage for InactivityCheckMessage {
    const CANONICAL_NAME: &'static str = "tbnf::message::InactivityCheckMessage";
    const AUTHOR: PermittedAuthor = PermittedAuthor::ClientOrHost;

    fn write_payload(&self, _w: &mut dyn Write) -> Result<(), CodecError> {
        Ok(())
    }

    fn read_payload(_r: &mut dyn Read) -> Result<Self, CodecError> {
        Ok(InactivityCheckMessage)
    }
}
