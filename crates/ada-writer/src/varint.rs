//! Little-endian base-128 varint, the record-length prefix ahead of each
//! framed protobuf payload in `events.bin` (§4.I). Mirrors
//! `original_source/atf_v4_writer.c`'s `encode_varint`.

/// Appends `value`'s varint encoding to `out`, returning the number of
/// bytes written.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) -> usize {
    let mut count = 0;
    while value >= 0x80 {
        out.push(((value & 0x7f) | 0x80) as u8);
        value >>= 7;
        count += 1;
    }
    out.push((value & 0x7f) as u8);
    count + 1
}

/// Decodes a varint from the front of `bytes`, returning the value and the
/// number of bytes consumed. Used by the (test-only, for now) reader side.
pub fn decode_varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        if i == 9 {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_fit_in_one_byte() {
        let mut buf = Vec::new();
        let n = encode_varint(5, &mut buf);
        assert_eq!(n, 1);
        assert_eq!(buf, vec![5]);
    }

    #[test]
    fn values_needing_continuation_bits_round_trip() {
        for value in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint(value, &mut buf);
            let (decoded, consumed) = decode_varint(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn truncated_input_fails_to_decode() {
        assert!(decode_varint(&[0x80, 0x80]).is_none());
    }
}
