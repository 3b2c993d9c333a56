//! Capacity computation and pre-embedding validation.
//!
//! Everything here is read-only; an embed that gets past [`validate`] is
//! guaranteed to have room for the whole payload and terminator.

use crate::bitstream;
use crate::carrier::Carrier;
use crate::config::{StegConfig, Strategy};
use crate::engine::{bpcs, lsb};
use crate::error::{Result, StegoError};
use crate::video::sequence;

/// Maximum embeddable bits (payload plus terminator) for `carrier` under `cfg`.
pub fn capacity(carrier: &Carrier, cfg: &StegConfig) -> Result<usize> {
    cfg.check_carrier(carrier.kind())?;
    let bits = match (carrier, cfg.strategy) {
        (Carrier::Image(img), Strategy::Bpcs) => {
            bpcs::capacity(img, &bpcs::BpcsParams::from(cfg))?
        }
        (Carrier::Image(img), Strategy::Lsb) => lsb::capacity(img, cfg.bit_width),
        (Carrier::Audio(audio), _) => lsb::capacity(audio, cfg.bit_width),
        (Carrier::Frames(frames), _) => sequence::capacity(frames, cfg.bit_width),
    };
    Ok(bits)
}

/// Largest payload in bytes that fits in `capacity_bits`.
pub fn max_payload_bytes(capacity_bits: usize) -> usize {
    capacity_bits.saturating_sub(bitstream::serialized_len(0)) / 8
}

/// Bits `payload` will occupy, after checking it survives a round trip.
pub fn required_bits(payload: &[u8]) -> Result<usize> {
    if let Some(offset) = bitstream::terminator_collision(payload) {
        return Err(StegoError::TerminatorCollision { offset });
    }
    Ok(bitstream::serialized_len(payload.len()))
}

/// `InsufficientCapacity` unless `required` fits in `available`.
pub fn fits(required: usize, available: usize) -> Result<()> {
    if required > available {
        Err(StegoError::InsufficientCapacity {
            required,
            available,
        })
    } else {
        Ok(())
    }
}

/// Check parameters, payload and capacity. Returns `(required, available)`
/// in bits.
pub fn validate(payload: &[u8], carrier: &Carrier, cfg: &StegConfig) -> Result<(usize, usize)> {
    let required = required_bits(payload)?;
    let available = capacity(carrier, cfg)?;
    fits(required, available)?;
    Ok((required, available))
}
