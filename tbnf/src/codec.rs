//! Binary payload encoding shared by every message variant.
//!
//! Integers are little-endian throughout. Strings use the length-prefixed UTF-8 convention of
//! the reference implementation's binary writer: a variable-length "7-bit encoded" integer
//! (the same scheme as .NET's `BinaryWriter.Write(string)`) followed by the raw UTF-8 bytes.
//! Honoring this exact scheme — rather than reaching for a fixed-width length prefix — is what
//! keeps this implementation wire-compatible with an existing deployment.

use crate::error::CodecError;
use byteorder::ReadBytesExt;
use std::io::{self, Read, Write};

/// Writes a length as a 7-bit-group variable-length integer (little-endian group order).
pub fn write_7bit_len<W: Write + ?Sized>(w: &mut W, mut value: usize) -> io::Result<()> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        w.write_all(&[byte])?;
        if value == 0 {
            break;
        }
    }
    Ok(())
}

/// Reads a 7-bit-group variable-length integer. Caps at 5 groups (35 bits), comfortably more
/// than the 65535-byte frame ceiling ever requires.
pub fn read_7bit_len<R: Read + ?Sized>(r: &mut R) -> io::Result<usize> {
    let mut result: usize = 0;
    let mut shift = 0u32;

    loop {
        let byte = r.read_u8()?;
        result |= ((byte & 0x7f) as usize) << shift;

        if byte & 0x80 == 0 {
            break;
        }

        shift += 7;
        if shift > 35 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "7-bit length prefix too long"));
        }
    }

    Ok(result)
}

/// `Write` helper for the string convention above. Blanket-implemented for every writer.
pub trait WritePayloadExt: Write {
    #[inline]
    fn write_string(&mut self, value: &str) -> io::Result<()> {
        write_7bit_len(self, value.len())?;
        self.write_all(value.as_bytes())
    }
}

impl<W: Write + ?Sized> WritePayloadExt for W {}

/// `Read` helper for the string convention above. Blanket-implemented for every reader.
pub trait ReadPayloadExt: Read {
    #[inline]
    fn read_string(&mut self) -> Result<String, CodecError> {
        let len = read_7bit_len(self).map_err(|_| CodecError::Malformed("truncated string length prefix"))?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)
            .map_err(|_| CodecError::Malformed("truncated string body"))?;
        String::from_utf8(buf).map_err(|_| CodecError::Malformed("string body is not valid utf-8"))
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, CodecError> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)
            .map_err(|_| CodecError::Malformed("truncated byte field"))?;
        Ok(buf)
    }
}

impl<R: Read + ?Sized> ReadPayloadExt for R {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_7bit_length_prefix() {
        for &len in &[0usize, 1, 127, 128, 16383, 16384, 65535] {
            let mut buf = Vec::new();
            write_7bit_len(&mut buf, len).unwrap();
            let mut cursor = &buf[..];
            assert_eq!(read_7bit_len(&mut cursor).unwrap(), len);
        }
    }

    #[test]
    fn roundtrips_string() {
        let mut buf = Vec::new();
        buf.write_string("hello, tbnf").unwrap();
        let mut cursor = &buf[..];
        assert_eq!(cursor.read_string().unwrap(), "hello, tbnf");
    }
}
