use log::debug;

use crate::bitstream::{BitSequence, Deserializer};
use crate::cancel::CancelToken;
use crate::carrier::ElementSequence;
use crate::config::{self, CANCEL_CHECK_INTERVAL};
use crate::error::{Result, StegoError};

/// Mask selecting the low `bit_width` bits of an element.
#[inline]
pub fn low_mask(bit_width: u8) -> u8 {
    ((1u16 << bit_width) - 1) as u8
}

/// Replace the low `bit_width` bits of `value` with `group`.
#[inline]
pub fn substitute(value: u8, group: u8, bit_width: u8) -> u8 {
    let mask = low_mask(bit_width);
    (value & !mask) | (group & mask)
}

/// Bits an element sequence can hold at `bit_width` bits per element.
pub fn capacity<S: ElementSequence + ?Sized>(seq: &S, bit_width: u8) -> usize {
    seq.element_count() * bit_width as usize
}

/// Embed the whole bit sequence from the first element.
///
/// Fails with `InsufficientCapacity` before touching anything if the
/// sequence is too short. Returns the number of elements written; every
/// element after those is left as it was.
pub fn embed<S: ElementSequence + ?Sized>(
    seq: &mut S,
    bits: &BitSequence,
    bit_width: u8,
    cancel: &CancelToken,
) -> Result<usize> {
    config::check_bit_width(bit_width)?;
    let available = capacity(seq, bit_width);
    if bits.len() > available {
        return Err(StegoError::InsufficientCapacity {
            required: bits.len(),
            available,
        });
    }
    let written = embed_slice(seq, bits, 0, bit_width, cancel)?;
    let elements = written.div_ceil(bit_width as usize);
    debug!("lsb: wrote {} bits into {} elements", bits.len(), elements);
    Ok(elements)
}

/// Write `bits[start_bit..]` into the sequence until either runs out.
///
/// The final group is zero-padded if fewer than `bit_width` bits remain.
/// Returns the number of payload bits consumed (never more than remain).
/// Does not check capacity; callers plan slices up front.
pub fn embed_slice<S: ElementSequence + ?Sized>(
    seq: &mut S,
    bits: &BitSequence,
    start_bit: usize,
    bit_width: u8,
    cancel: &CancelToken,
) -> Result<usize> {
    let total = bits.len();
    let width = bit_width as usize;
    let mut cursor = start_bit;
    let mut index = 0;
    while cursor < total && index < seq.element_count() {
        if index % CANCEL_CHECK_INTERVAL == 0 {
            cancel.check()?;
        }
        let group = bits.group(cursor, bit_width);
        let value = seq.element(index);
        seq.set_element(index, substitute(value, group, bit_width));
        cursor += width;
        index += 1;
    }
    Ok(cursor.min(total) - start_bit.min(total))
}

/// Feed the low bits of every element to `de` until the terminator shows up.
/// Returns `true` if it did.
pub fn extract_into<S: ElementSequence + ?Sized>(
    seq: &S,
    bit_width: u8,
    de: &mut Deserializer,
) -> bool {
    let mask = low_mask(bit_width);
    for index in 0..seq.element_count() {
        if de.push_group(seq.element(index) & mask, bit_width) {
            debug!("lsb: terminator found at element {}", index);
            return true;
        }
    }
    false
}

/// Recover a payload embedded with [`embed`].
pub fn extract<S: ElementSequence + ?Sized>(seq: &S, bit_width: u8) -> Result<Vec<u8>> {
    config::check_bit_width(bit_width)?;
    let mut de = Deserializer::new();
    extract_into(seq, bit_width, &mut de);
    de.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream;

    fn embed_payload(seq: &mut Vec<u8>, payload: &[u8], bit_width: u8) -> Result<usize> {
        embed(seq, &bitstream::serialize(payload), bit_width, &CancelToken::new())
    }

    fn cover(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 37 + 11) as u8).collect()
    }

    #[test]
    fn test_masking_preserves_high_bits() {
        assert_eq!(substitute(0b1111_1111, 0b101, 3), 0b1111_1101);
        assert_eq!(substitute(0b0000_0000, 0b101, 3), 0b0000_0101);
        assert_eq!(substitute(0xAB, 0x12, 8), 0x12);
        assert_eq!(low_mask(8), 0xFF);
        assert_eq!(low_mask(1), 0x01);
    }

    #[test]
    fn test_embed_group_order() {
        // Payload 0b101xxxxx: first three bits land as one group, MSB first.
        let mut seq = vec![0xFFu8; 40];
        embed_payload(&mut seq, &[0b1010_0000], 3).unwrap();
        assert_eq!(seq[0], 0b1111_1101);
        assert_eq!(seq[1], 0b1111_1000);
    }

    #[test]
    fn test_roundtrip_every_width() {
        let payload = b"The quick brown fox \x00 jumps";
        for n in 1..=8u8 {
            let mut seq = cover(1024);
            embed_payload(&mut seq, payload, n).unwrap();
            assert_eq!(extract(&seq, n).unwrap(), payload, "width {n}");
        }
    }

    #[test]
    fn test_elements_after_terminator_untouched() {
        let original = cover(500);
        let mut seq = original.clone();
        let payload = b"short";
        let used = embed_payload(&mut seq, payload, 2).unwrap();
        assert_eq!(used, bitstream::serialized_len(payload.len()).div_ceil(2));
        assert_eq!(&seq[used..], &original[used..]);
        for (a, b) in seq[..used].iter().zip(&original[..used]) {
            assert_eq!(a & !0b11, b & !0b11);
        }
    }

    #[test]
    fn test_exact_capacity_boundary() {
        let payload = vec![0x5Au8; 12];
        let needed = bitstream::serialized_len(payload.len());

        let mut exact = cover(needed);
        assert_eq!(capacity(exact.as_slice(), 1), needed);
        embed_payload(&mut exact, &payload, 1).unwrap();
        assert_eq!(extract(&exact, 1).unwrap(), payload);

        let original = cover(needed - 1);
        let mut short = original.clone();
        let err = embed_payload(&mut short, &payload, 1).unwrap_err();
        assert!(matches!(
            err,
            StegoError::InsufficientCapacity { required, available }
                if required == needed && available == needed - 1
        ));
        assert_eq!(short, original);
    }

    #[test]
    fn test_zero_padding_on_last_group() {
        // 8 payload bits + 64 terminator bits = 72, not a multiple of 5.
        let mut seq = vec![0xFFu8; 20];
        let used = embed_payload(&mut seq, b"a", 5).unwrap();
        assert_eq!(used, 15);
        // 72 = 14 * 5 + 2: last element holds "10" then three zero pad bits
        assert_eq!(seq[14] & 0b1_1111, 0b10000);
        assert_eq!(extract(&seq, 5).unwrap(), b"a");
    }

    #[test]
    fn test_empty_payload_changes_only_terminator_elements() {
        let original = cover(100);
        let mut seq = original.clone();
        let used = embed_payload(&mut seq, &[], 1).unwrap();
        assert_eq!(used, 64);
        assert_eq!(&seq[64..], &original[64..]);
        assert!(extract(&seq, 1).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_width_does_not_find_terminator() {
        let mut seq = vec![0u8; 2000];
        embed_payload(&mut seq, b"hello", 1).unwrap();
        assert!(matches!(extract(&seq, 3), Err(StegoError::TerminatorNotFound)));
    }

    #[test]
    fn test_embed_slice_resumes_mid_stream() {
        let bits = bitstream::serialize(b"split me");
        let total = bits.len();
        let cancel = CancelToken::new();

        let mut first = vec![0u8; 20];
        let mut second = vec![0u8; 100];
        let a = embed_slice(&mut first, &bits, 0, 2, &cancel).unwrap();
        assert_eq!(a, 40);
        let b = embed_slice(&mut second, &bits, a, 2, &cancel).unwrap();
        assert_eq!(a + b, total);

        let mut de = Deserializer::new();
        assert!(!extract_into(&first, 2, &mut de));
        assert!(extract_into(&second, 2, &mut de));
        assert_eq!(de.finish().unwrap(), b"split me");
    }

    #[test]
    fn test_cancelled_embed() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut seq = vec![0u8; 1000];
        let bits = bitstream::serialize(b"x");
        assert!(matches!(
            embed(&mut seq, &bits, 1, &cancel),
            Err(StegoError::Cancelled)
        ));
    }
}
