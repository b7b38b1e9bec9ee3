//! Field-level readers and writers shared by the packet codecs.
//!
//! Readers take `&mut &[u8]` and advance it past what they consume; they
//! check the remaining length first so a truncated body surfaces as
//! `IncompletePacket` instead of a panic inside `bytes::Buf`.

use crate::error::ProtocolError;
use crate::MAX_STRING_LEN;
use bytes::{Buf, BufMut, Bytes};

fn ensure(src: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if src.len() < needed {
        return Err(ProtocolError::IncompletePacket {
            needed,
            available: src.len(),
        });
    }
    Ok(())
}

pub fn read_u8(src: &mut &[u8]) -> Result<u8, ProtocolError> {
    ensure(src, 1)?;
    Ok(src.get_u8())
}

pub fn read_u16(src: &mut &[u8]) -> Result<u16, ProtocolError> {
    ensure(src, 2)?;
    Ok(src.get_u16())
}

/// Reads a u16-length-prefixed byte field.
pub fn read_binary(src: &mut &[u8]) -> Result<Bytes, ProtocolError> {
    let len = read_u16(src)? as usize;
    ensure(src, len)?;
    Ok(src.copy_to_bytes(len))
}

/// Reads a u16-length-prefixed UTF-8 string. NUL characters are rejected.
pub fn read_string(src: &mut &[u8]) -> Result<String, ProtocolError> {
    let len = read_u16(src)? as usize;
    ensure(src, len)?;
    let s = std::str::from_utf8(&src[..len]).map_err(|_| ProtocolError::InvalidUtf8)?;
    if s.contains('\0') {
        return Err(ProtocolError::malformed("string contains U+0000"));
    }
    let s = s.to_string();
    src.advance(len);
    Ok(s)
}

/// Encoded size of a length-prefixed field.
pub fn field_len(data: &[u8]) -> usize {
    2 + data.len()
}

pub fn check_field(data: &[u8]) -> Result<(), ProtocolError> {
    if data.len() > MAX_STRING_LEN {
        return Err(ProtocolError::StringTooLong(data.len()));
    }
    Ok(())
}

/// Checks a string field against the rules `read_string` applies.
pub fn check_string(s: &str) -> Result<(), ProtocolError> {
    check_field(s.as_bytes())?;
    if s.contains('\0') {
        return Err(ProtocolError::malformed("string contains U+0000"));
    }
    Ok(())
}

/// Writes a u16-length-prefixed field. Length is validated by `check_field`.
pub fn put_field<B: BufMut>(dst: &mut B, data: &[u8]) {
    dst.put_u16(data.len() as u16);
    dst.put_slice(data);
}
