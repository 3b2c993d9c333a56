use crate::config::{TERMINATOR, TERMINATOR_BITS};
use crate::error::{Result, StegoError};

/// A payload followed by the terminator, addressed bit by bit (MSB first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSequence {
    bytes: Vec<u8>,
}

impl BitSequence {
    pub fn len(&self) -> usize {
        self.bytes.len() * 8
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bit at `index`; 0 past the end.
    pub fn bit(&self, index: usize) -> u8 {
        match self.bytes.get(index / 8) {
            Some(byte) => (byte >> (7 - index % 8)) & 1,
            None => 0,
        }
    }

    /// `width` bits starting at `start`, first bit in the most significant
    /// position. Bits past the end read as zero.
    pub fn group(&self, start: usize, width: u8) -> u8 {
        let mut value = 0u8;
        for i in 0..width as usize {
            value = (value << 1) | self.bit(start + i);
        }
        value
    }

    pub fn bits(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len()).map(|i| self.bit(i))
    }
}

/// Bit length of `serialize(payload)` for a payload of `payload_len` bytes.
pub fn serialized_len(payload_len: usize) -> usize {
    payload_len * 8 + TERMINATOR_BITS
}

/// Expand a payload to bits and append the terminator.
pub fn serialize(payload: &[u8]) -> BitSequence {
    let mut bytes = Vec::with_capacity(payload.len() + TERMINATOR.len());
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&TERMINATOR);
    BitSequence { bytes }
}

/// Offset at which a decoder would see the terminator before the one
/// appended by [`serialize`], or `None` if the payload decodes intact.
pub fn terminator_collision(payload: &[u8]) -> Option<usize> {
    let mut framed = Vec::with_capacity(payload.len() + TERMINATOR.len());
    framed.extend_from_slice(payload);
    framed.extend_from_slice(&TERMINATOR);
    framed
        .windows(TERMINATOR.len())
        .position(|w| w == TERMINATOR)
        .filter(|&pos| pos < payload.len())
}

/// Incremental bit-to-byte decoder.
///
/// Bits are pushed one at a time (or as `n`-bit groups); after every
/// completed byte the tail is compared against the terminator so the
/// caller can stop reading the carrier as soon as the payload ends.
#[derive(Debug, Default)]
pub struct Deserializer {
    bytes: Vec<u8>,
    current: u8,
    filled: u8,
    complete: bool,
}

impl Deserializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one bit. Returns `true` once the terminator has been seen;
    /// further bits are ignored.
    pub fn push_bit(&mut self, bit: u8) -> bool {
        if self.complete {
            return true;
        }
        self.current = (self.current << 1) | (bit & 1);
        self.filled += 1;
        if self.filled == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.filled = 0;
            if self.bytes.ends_with(&TERMINATOR) {
                self.bytes.truncate(self.bytes.len() - TERMINATOR.len());
                self.complete = true;
            }
        }
        self.complete
    }

    /// Push the low `width` bits of `value`, most significant first.
    pub fn push_group(&mut self, value: u8, width: u8) -> bool {
        for shift in (0..width).rev() {
            if self.push_bit(value >> shift) {
                return true;
            }
        }
        self.complete
    }

    /// The recovered payload, or `TerminatorNotFound` if the bit source ran
    /// out first.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.complete {
            Ok(self.bytes)
        } else {
            Err(StegoError::TerminatorNotFound)
        }
    }
}

/// Decode a complete bit source (one bit per item, low bit significant).
pub fn deserialize<I>(bits: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = u8>,
{
    let mut de = Deserializer::new();
    for bit in bits {
        if de.push_bit(bit) {
            break;
        }
    }
    de.finish()
}
