use std::fmt;

use crate::carrier::CarrierKind;
use crate::error::{Result, StegoError};

// End-of-payload sentinel, version 1: "\xFE\xFF" "STEG" "\xFF\xFE"
pub const TERMINATOR: [u8; 8] = [0xFE, 0xFF, 0x53, 0x54, 0x45, 0x47, 0xFF, 0xFE];
pub const TERMINATOR_BITS: usize = TERMINATOR.len() * 8;

// Embedding parameters
pub const MIN_BIT_WIDTH: u8 = 1;
pub const MAX_BIT_WIDTH: u8 = 8;
pub const DEFAULT_BIT_WIDTH: u8 = 1;

// BPCS parameters
pub const DEFAULT_BLOCK_SIZE: usize = 8;
pub const DEFAULT_COMPLEXITY_THRESHOLD: u32 = 30;

/// Elements processed between two cancellation checks.
pub const CANCEL_CHECK_INTERVAL: usize = 1 << 16;

// Video parameters
pub const VIDEO_CODEC: &str = "ffv1";
pub const VIDEO_PIXEL_FORMAT: &str = "rgb24";
pub const VIDEO_CHANNELS: usize = 3;

/// Highest transition count an `block_size` x `block_size` bit block can have.
pub fn max_complexity(block_size: usize) -> u32 {
    (2 * block_size * (block_size - 1)) as u32
}

/// Payload bits one BPCS block carries (one position is the conjugation flag).
pub fn bits_per_block(block_size: usize) -> usize {
    block_size * block_size - 1
}

/// Embedding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Strategy {
    /// Fixed-width least-significant-bit substitution
    #[default]
    Lsb,
    /// Bit-plane complexity segmentation (images only)
    Bpcs,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Lsb => write!(f, "lsb"),
            Strategy::Bpcs => write!(f, "bpcs"),
        }
    }
}

/// Runtime parameters for an encode/decode operation.
///
/// None of these are stored in the stego artifact; decoding must use the
/// same values as encoding.
#[derive(Debug, Clone)]
pub struct StegConfig {
    pub bit_width: u8,
    pub strategy: Strategy,
    pub block_size: usize,
    pub complexity_threshold: u32,
}

impl Default for StegConfig {
    fn default() -> Self {
        Self {
            bit_width: DEFAULT_BIT_WIDTH,
            strategy: Strategy::Lsb,
            block_size: DEFAULT_BLOCK_SIZE,
            complexity_threshold: DEFAULT_COMPLEXITY_THRESHOLD,
        }
    }
}

impl StegConfig {
    pub fn lsb(bit_width: u8) -> Self {
        Self {
            bit_width,
            ..Default::default()
        }
    }

    pub fn bpcs(bit_width: u8) -> Self {
        Self {
            bit_width,
            strategy: Strategy::Bpcs,
            ..Default::default()
        }
    }

    /// Check the parameters independently of any carrier.
    pub fn validate(&self) -> Result<()> {
        check_bit_width(self.bit_width)?;
        if self.strategy == Strategy::Bpcs {
            if self.block_size < 2 {
                return Err(StegoError::InvalidParameters(format!(
                    "block size must be at least 2, got {}",
                    self.block_size
                )));
            }
            // Conjugation maps complexity c to max - c; the threshold must sit
            // below the midpoint for a conjugated block to stay eligible.
            let max = max_complexity(self.block_size);
            if self.complexity_threshold.saturating_mul(2) >= max {
                return Err(StegoError::InvalidParameters(format!(
                    "complexity threshold {} must be below {} for {}x{} blocks",
                    self.complexity_threshold,
                    max.div_ceil(2),
                    self.block_size,
                    self.block_size
                )));
            }
        }
        Ok(())
    }

    /// Check the parameters against the kind of carrier they will be used on.
    pub fn check_carrier(&self, kind: CarrierKind) -> Result<()> {
        self.validate()?;
        if self.strategy == Strategy::Bpcs && kind != CarrierKind::Image {
            return Err(StegoError::InvalidParameters(format!(
                "BPCS applies only to image carriers, not {kind}"
            )));
        }
        Ok(())
    }
}

pub fn check_bit_width(bit_width: u8) -> Result<()> {
    if (MIN_BIT_WIDTH..=MAX_BIT_WIDTH).contains(&bit_width) {
        Ok(())
    } else {
        Err(StegoError::InvalidParameters(format!(
            "bit width must be in {MIN_BIT_WIDTH}..={MAX_BIT_WIDTH}, got {bit_width}"
        )))
    }
}
