//! Wire shape of one discovery answer (§3, §4.8): a human-readable name, an opaque game
//! identifier used to filter unrelated hosts, arbitrary additional bytes, and the host's own
//! address and TCP listening port.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use std::net::IpAddr;

/// Describes one discoverable host, as carried in a discovery answer datagram.
///
/// Wire layout (§4.8): `u16 additionalDataLength | string name | string gameIdentifier |
/// additionalDataLength bytes | u8 addressByteLength | addressByteLength bytes | i32 port`.
/// Strings use the same 7-bit-group length-prefixed encoding as TCP message payloads
/// (see [`crate::codec`]); this runs over bare UDP, with no registry or type tag involved.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DiscoverableEndpointDescriptor {
    pub name: String,
    pub game_identifier: String,
    pub additional_data: Vec<u8>,
    pub address: IpAddr,
    pub port: u16,
}

impl DiscoverableEndpointDescriptor {
    pub fn new(name: impl Into<String>, game_identifier: impl Into<String>, address: IpAddr, port: u16) -> DiscoverableEndpointDescriptor {
        DiscoverableEndpointDescriptor {
            name: name.into(),
            game_identifier: game_identifier.into(),
            additional_data: Vec::new(),
            address,
            port,
        }
    }

    pub fn with_additional_data(mut self, data: Vec<u8>) -> DiscoverableEndpointDescriptor {
        self.additional_data = data;
        self
    }

    pub fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        use crate::codec::WritePayloadExt;

        w.write_u16::<LittleEndian>(self.additional_data.len() as u16)?;
        w.write_string(&self.name)?;
        w.write_string(&self.game_identifier)?;
        w.write_all(&self.additional_data)?;

        match self.address {
            IpAddr::V4(v4) => {
                w.write_u8(4)?;
                w.write_all(&v4.octets())?;
            }
            IpAddr::V6(v6) => {
                w.write_u8(16)?;
                w.write_all(&v6.octets())?;
            }
        }

        w.write_i32::<LittleEndian>(self.port as i32)
    }

    pub fn decode(r: &mut dyn Read) -> io::Result<DiscoverableEndpointDescriptor> {
        use crate::codec::ReadPayloadExt;

        let invalid = |what: &'static str| io::Error::new(io::ErrorKind::InvalidData, what);

        let additional_len = r.read_u16::<LittleEndian>()? as usize;
        let name = r.read_string().map_err(|_| invalid("malformed descriptor name"))?;
        let game_identifier = r.read_string().map_err(|_| invalid("malformed descriptor game identifier"))?;
        let additional_data = r.read_bytes(additional_len).map_err(|_| invalid("truncated additional data"))?;

        let address_len = r.read_u8()?;
        let address = match address_len {
            4 => {
                let mut octets = [0u8; 4];
                r.read_exact(&mut octets)?;
                IpAddr::from(octets)
            }
            16 => {
                let mut octets = [0u8; 16];
                r.read_exact(&mut octets)?;
                IpAddr::from(octets)
            }
            _ => return Err(invalid("unsupported descriptor address length")),
        };

        let port = r.read_i32::<LittleEndian>()? as u16;

        Ok(DiscoverableEndpointDescriptor {
            name,
            game_identifier,
            additional_data,
            address,
            port,
        })
    }
}
