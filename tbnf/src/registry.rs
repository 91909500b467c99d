//! Message Registry: assigns a stable 16-bit [`TypeTag`] to every registered variant and
//! provides the reverse lookup used when decoding a frame off the wire.
//!
//! Both peers must register the same set of variants; see [`MessageRegistry::build`] for the
//! ordering contract that makes this deterministic without a handshake-time negotiation.

use crate::error::{CodecError, RegistryError};
use crate::message::{IdentificationMessage, InactivityCheckMessage, LoginConfirmationMessage, PermittedAuthor, WireMessage};
use byteorder::{ByteOrder, LittleEndian};
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// 16-bit type tag identifying a registered variant. `0` is reserved for "unknown/unregistered".
pub type TypeTag = u16;

/// Maximum on-wire frame size (type tag + payload), per §3.
pub const MAX_FRAME_SIZE: usize = 65535;

type EncodeFn = fn(&dyn Any, &mut dyn std::io::Write) -> Result<(), CodecError>;
type DecodeFn = fn(&mut dyn std::io::Read) -> Result<Box<dyn Any + Send + Sync>, CodecError>;

/// Type-erased description of one registered variant.
pub struct MessageDescriptor {
    pub canonical_name: &'static str,
    pub author: PermittedAuthor,
    type_id: TypeId,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl MessageDescriptor {
    /// Build a descriptor for a concrete [`WireMessage`] implementation.
    pub fn of<M: WireMessage>() -> MessageDescriptor {
        MessageDescriptor {
            canonical_name: M::CANONICAL_NAME,
            author: M::AUTHOR,
            type_id: TypeId::of::<M>(),
            encode: |any, w| {
                any.downcast_ref::<M>()
                    .expect("encode descriptor invoked with mismatched concrete type")
                    .write_payload(w)
            },
            decode: |r| Ok(Box::new(M::read_payload(r)?)),
        }
    }
}

/// Process-wide, append-only table of registered message variants.
///
/// Registration is a one-shot, deterministic operation: the full variant set is sorted
/// lexicographically by [`WireMessage::CANONICAL_NAME`] and tags are assigned `1..=N` in that
/// order (§4.1). Because both peers build their registries from an identical variant set, they
/// always agree on tags without exchanging them.
pub struct MessageRegistry {
    descriptors: Vec<MessageDescriptor>,
    tag_by_type: HashMap<TypeId, TypeTag>,
}

impl MessageRegistry {
    /// Register the three built-in system messages plus every user-supplied descriptor.
    ///
    /// Fails only if two distinct concrete types were registered under the same canonical
    /// name (an implementation bug — the true "re-register under a different tag" hazard from
    /// §4.1). Registering the exact same type twice is idempotent: duplicates are discarded
    /// before sorting.
    pub fn build(mut user_descriptors: Vec<MessageDescriptor>) -> Result<MessageRegistry, RegistryError> {
        let mut all = vec![
            MessageDescriptor::of::<IdentificationMessage>(),
            MessageDescriptor::of::<LoginConfirmationMessage>(),
            MessageDescriptor::of::<InactivityCheckMessage>(),
        ];
        all.append(&mut user_descriptors);

        // Stable total order by canonical name, per §4.1.
        all.sort_by(|a, b| a.canonical_name.cmp(b.canonical_name));

        let mut deduped: Vec<MessageDescriptor> = Vec::with_capacity(all.len());
        let mut seen: IndexMap<&'static str, TypeId> = IndexMap::new();

        for descriptor in all {
            match seen.get(descriptor.canonical_name) {
                Some(&existing_type) if existing_type == descriptor.type_id => continue, // idempotent re-registration
                Some(_) => return Err(RegistryError::DuplicateTag(descriptor.canonical_name)),
                None => {
                    seen.insert(descriptor.canonical_name, descriptor.type_id);
                    deduped.push(descriptor);
                }
            }
        }

        let mut tag_by_type = HashMap::with_capacity(deduped.len());
        for (index, descriptor) in deduped.iter().enumerate() {
            // Tags start at 1; index 0 in `deduped` is tag 1.
            tag_by_type.insert(descriptor.type_id, (index + 1) as TypeTag);
        }

        Ok(MessageRegistry {
            descriptors: deduped,
            tag_by_type,
        })
    }

    /// Look up the tag assigned to a statically-known variant.
    #[inline]
    pub fn tag_of<M: WireMessage>(&self) -> Option<TypeTag> {
        self.tag_by_type.get(&TypeId::of::<M>()).copied()
    }

    /// Reverse lookup: the descriptor registered under `tag`, if any.
    #[inline]
    pub fn descriptor_for(&self, tag: TypeTag) -> Option<&MessageDescriptor> {
        if tag == 0 {
            return None;
        }
        self.descriptors.get(tag as usize - 1)
    }

    /// Number of registered variants (built-ins included).
    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// An immutable packaged message: `[TypeTag: u16 LE][PayloadBytes...]` (§3).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PackagedFrame {
    bytes: Vec<u8>,
}

impl PackagedFrame {
    /// Pack `message` into a frame. Fails with `Malformed` if the registry has no tag for `M`,
    /// or `FrameTooLarge` if the packed frame (type tag + payload) exceeds [`MAX_FRAME_SIZE`]
    /// (§3, §7).
    pub fn pack<M: WireMessage>(registry: &MessageRegistry, message: &M) -> Result<PackagedFrame, CodecError> {
        let tag = registry
            .tag_of::<M>()
            .ok_or(CodecError::Malformed("message type is not registered"))?;

        let mut bytes = Vec::with_capacity(2 + 16);
        bytes.extend_from_slice(&tag.to_le_bytes());
        message.write_payload(&mut bytes)?;

        if bytes.len() > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge(bytes.len()));
        }

        Ok(PackagedFrame { bytes })
    }

    /// Unpack into a concrete, statically-known variant. Fails with `TagMismatch` if the
    /// frame's leading tag does not match `M`'s registered tag (§4.2).
    pub fn unpack<M: WireMessage>(&self, registry: &MessageRegistry) -> Result<M, CodecError> {
        let target = registry
            .tag_of::<M>()
            .ok_or(CodecError::Malformed("message type is not registered"))?;

        if self.type_tag() != target {
            return Err(CodecError::TagMismatch {
                frame: self.type_tag(),
                target,
            });
        }

        let mut cursor = &self.bytes[2..];
        M::read_payload(&mut cursor)
    }

    /// Decode using a runtime-resolved descriptor (used by the generic frame reader, which
    /// does not know the concrete variant ahead of time).
    pub(crate) fn unpack_dyn(&self, registry: &MessageRegistry) -> Option<Box<dyn Any + Send + Sync>> {
        let descriptor = registry.descriptor_for(self.type_tag())?;
        let mut cursor = &self.bytes[2..];
        (descriptor.decode)(&mut cursor).ok()
    }

    pub(crate) fn from_wire(bytes: Vec<u8>) -> PackagedFrame {
        PackagedFrame { bytes }
    }

    #[inline]
    pub fn type_tag(&self) -> TypeTag {
        LittleEndian::read_u16(&self.bytes[0..2])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Eq, PartialEq)]
    struct StringMessage {
        text: String,
    }

    impl WireMessage for StringMessage {
        const CANONICAL_NAME: &'static str = "tbnf::tests::StringMessage";
        const AUTHOR: PermittedAuthor = PermittedAuthor::ClientOrHost;

        fn write_payload(&self, w: &mut dyn std::io::Write) -> Result<(), CodecError> {
            use crate::codec::WritePayloadExt;
            w.write_string(&self.text).map_err(|_| CodecError::Malformed("write failed"))
        }

        fn read_payload(r: &mut dyn std::io::Read) -> Result<Self, CodecError> {
            use crate::codec::ReadPayloadExt;
            Ok(StringMessage { text: r.read_string()? })
        }
    }

    #[test]
    fn every_variant_round_trips_its_own_tag() {
        let registry = MessageRegistry::build(vec![MessageDescriptor::of::<StringMessage>()]).unwrap();

        for tag in 1..=registry.len() as TypeTag {
            let descriptor = registry.descriptor_for(tag).unwrap();
            assert!(!descriptor.canonical_name.is_empty());
        }

        assert!(registry.tag_of::<StringMessage>().unwrap() >= 1);
    }

    #[test]
    fn frame_round_trip() {
        let registry = MessageRegistry::build(vec![MessageDescriptor::of::<StringMessage>()]).unwrap();
        let message = StringMessage { text: "hello".into() };

        let frame = PackagedFrame::pack(&registry, &message).unwrap();
        let tag = registry.tag_of::<StringMessage>().unwrap();
        assert_eq!(frame.type_tag(), tag);

        let decoded: StringMessage = frame.unpack(&registry).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn deterministic_ordering_across_two_registries() {
        let a = MessageRegistry::build(vec![MessageDescriptor::of::<StringMessage>()]).unwrap();
        let b = MessageRegistry::build(vec![MessageDescriptor::of::<StringMessage>()]).unwrap();

        assert_eq!(a.tag_of::<StringMessage>(), b.tag_of::<StringMessage>());
    }

    #[test]
    fn duplicate_registration_of_same_type_is_idempotent() {
        let registry = MessageRegistry::build(vec![
            MessageDescriptor::of::<StringMessage>(),
            MessageDescriptor::of::<StringMessage>(),
        ])
        .unwrap();

        // Built-ins (3) + one deduplicated user variant.
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn tag_mismatch_is_rejected() {
        let registry = MessageRegistry::build(vec![MessageDescriptor::of::<StringMessage>()]).unwrap();
        let frame = PackagedFrame::pack(&registry, &IdentificationMessage { hardware_address: [0; 6] }).unwrap();

        let err = frame.unpack::<StringMessage>(&registry).unwrap_err();
        assert!(matches!(err, CodecError::TagMismatch { .. }));
    }

    #[test]
    fn pack_rejects_a_frame_over_the_65535_byte_ceiling() {
        let registry = MessageRegistry::build(vec![MessageDescriptor::of::<StringMessage>()]).unwrap();
        let oversized = StringMessage {
            text: "x".repeat(MAX_FRAME_SIZE),
        };

        let err = PackagedFrame::pack(&registry, &oversized).unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge(_)));
    }
}
