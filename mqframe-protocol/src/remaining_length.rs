//! Remaining-length variable byte integer.
//!
//! Seven bits of value per byte, least significant group first; the high bit
//! of each byte is a continuation flag. At most four bytes are allowed.
//!
//! ```text
//!        0 ..        127   1 byte
//!      128 ..     16 383   2 bytes
//!   16 384 ..  2 097 151   3 bytes
//! 2 097 152 .. 268 435 455 4 bytes
//! ```

use crate::error::ProtocolError;
use crate::MAX_REMAINING_LENGTH;
use bytes::BufMut;

/// Maximum number of bytes the field may occupy.
pub const MAX_LEN: usize = 4;

const CONTINUATION: u8 = 0x80;

/// Returns the number of bytes needed to encode `value`.
pub fn encoded_len(value: usize) -> usize {
    match value {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}

/// Encodes `value` into the front of `dst`, returning the number of bytes written.
pub fn encode(value: usize, mut dst: &mut [u8]) -> Result<usize, ProtocolError> {
    let needed = encoded_len(value);
    if dst.len() < needed {
        return Err(ProtocolError::BufferTooSmall {
            needed,
            available: dst.len(),
        });
    }
    put(value, &mut dst)
}

/// Writes `value` into any `BufMut`. The caller guarantees capacity.
pub(crate) fn put<B: BufMut>(mut value: usize, dst: &mut B) -> Result<usize, ProtocolError> {
    if value > MAX_REMAINING_LENGTH {
        return Err(ProtocolError::PacketTooLarge {
            size: value,
            max: MAX_REMAINING_LENGTH,
        });
    }

    let mut written = 0;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= CONTINUATION;
        }
        dst.put_u8(byte);
        written += 1;
        if value == 0 {
            return Ok(written);
        }
    }
}

/// Decodes a remaining length from the front of `src`.
///
/// Returns `Ok(Some((value, bytes_used)))` once a terminating byte is found,
/// `Ok(None)` if `src` ends while the continuation bit is still set, and
/// `Err(RemainingLengthTooLong)` if the fourth byte still has it set.
pub fn decode(src: &[u8]) -> Result<Option<(usize, usize)>, ProtocolError> {
    let mut value = 0usize;

    for (i, &byte) in src.iter().take(MAX_LEN).enumerate() {
        value |= ((byte & !CONTINUATION) as usize) << (7 * i);
        if byte & CONTINUATION == 0 {
            return Ok(Some((value, i + 1)));
        }
    }

    if src.len() >= MAX_LEN {
        return Err(ProtocolError::RemainingLengthTooLong);
    }
    Ok(None)
}
