//! Bit-Plane Complexity Segmentation.
//!
//! Each channel of an image is split into bit-planes, each plane into
//! square blocks. Only blocks whose transition count exceeds the threshold
//! ("noise-like" regions) carry payload bits.
//!
//! Overwriting a block changes its complexity, so the decoder could
//! disagree about which blocks are eligible. The top-left bit of every used
//! block is reserved as a conjugation flag: if the filled block is no
//! longer complex enough it is XORed with a checkerboard, which maps
//! complexity `c` to `max - c` and raises the flag. Decoding undoes the XOR
//! when the flag is set.
//!
//! Scan order: plane 0 (LSB) upward, then channel, then blocks row-major.
//! Partial blocks at the right and bottom edges are never used.

use log::debug;
use rayon::prelude::*;

use crate::bitstream::{BitSequence, Deserializer};
use crate::cancel::CancelToken;
use crate::carrier::ImageCarrier;
use crate::config::{self, StegConfig};
use crate::error::{Result, StegoError};

/// BPCS tuning derived from a [`StegConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpcsParams {
    pub block_size: usize,
    pub threshold: u32,
    /// Low bit-planes used per channel.
    pub planes: u8,
}

impl From<&StegConfig> for BpcsParams {
    fn from(cfg: &StegConfig) -> Self {
        Self {
            block_size: cfg.block_size,
            threshold: cfg.complexity_threshold,
            planes: cfg.bit_width,
        }
    }
}

/// Outcome of a BPCS embed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BpcsReport {
    pub blocks_used: usize,
    pub blocks_conjugated: usize,
    pub bits_written: usize,
}

#[derive(Debug, Clone, Copy)]
struct BlockRef {
    plane: u8,
    channel: usize,
    x: usize,
    y: usize,
}

fn scan_order(img: &ImageCarrier, params: &BpcsParams) -> Vec<BlockRef> {
    let bs = params.block_size;
    let blocks_x = img.width() as usize / bs;
    let blocks_y = img.height() as usize / bs;
    let channels = img.channels() as usize;

    let mut order = Vec::with_capacity(params.planes as usize * channels * blocks_x * blocks_y);
    for plane in 0..params.planes {
        for channel in 0..channels {
            for by in 0..blocks_y {
                for bx in 0..blocks_x {
                    order.push(BlockRef {
                        plane,
                        channel,
                        x: bx * bs,
                        y: by * bs,
                    });
                }
            }
        }
    }
    order
}

fn read_block(img: &ImageCarrier, block: BlockRef, bs: usize, out: &mut [u8]) {
    for row in 0..bs {
        for col in 0..bs {
            let v = img.sample(block.x + col, block.y + row, block.channel);
            out[row * bs + col] = (v >> block.plane) & 1;
        }
    }
}

fn write_block(img: &mut ImageCarrier, block: BlockRef, bs: usize, bits: &[u8]) {
    let mask = 1u8 << block.plane;
    for row in 0..bs {
        for col in 0..bs {
            let (x, y) = (block.x + col, block.y + row);
            let v = img.sample(x, y, block.channel);
            let bit = bits[row * bs + col] << block.plane;
            img.set_sample(x, y, block.channel, (v & !mask) | bit);
        }
    }
}

/// Number of 0/1 transitions along the rows and columns of a square block.
pub fn complexity(bits: &[u8], bs: usize) -> u32 {
    let mut transitions = 0;
    for row in 0..bs {
        for col in 0..bs {
            let here = bits[row * bs + col];
            if col + 1 < bs && here != bits[row * bs + col + 1] {
                transitions += 1;
            }
            if row + 1 < bs && here != bits[(row + 1) * bs + col] {
                transitions += 1;
            }
        }
    }
    transitions
}

/// XOR with the checkerboard that has a 1 in the top-left corner.
fn conjugate(bits: &mut [u8], bs: usize) {
    for row in 0..bs {
        for col in 0..bs {
            bits[row * bs + col] ^= ((row + col) % 2 == 0) as u8;
        }
    }
}

fn eligible(img: &ImageCarrier, block: BlockRef, params: &BpcsParams) -> bool {
    let mut bits = vec![0u8; params.block_size * params.block_size];
    read_block(img, block, params.block_size, &mut bits);
    complexity(&bits, params.block_size) > params.threshold
}

fn check_params(params: &BpcsParams) -> Result<()> {
    config::check_bit_width(params.planes)?;
    if params.block_size < 2
        || params.threshold.saturating_mul(2) >= config::max_complexity(params.block_size)
    {
        return Err(StegoError::InvalidParameters(format!(
            "block size {} with threshold {} cannot round-trip",
            params.block_size, params.threshold
        )));
    }
    Ok(())
}

/// Payload bits the image can hold under `params`.
pub fn capacity(img: &ImageCarrier, params: &BpcsParams) -> Result<usize> {
    check_params(params)?;
    let blocks = scan_order(img, params)
        .into_par_iter()
        .filter(|&b| eligible(img, b, params))
        .count();
    Ok(blocks * config::bits_per_block(params.block_size))
}

/// Embed `bits` into the eligible blocks of `img`.
///
/// Capacity is checked before any sample changes.
pub fn embed(
    img: &mut ImageCarrier,
    bits: &BitSequence,
    params: &BpcsParams,
    cancel: &CancelToken,
) -> Result<BpcsReport> {
    let available = capacity(img, params)?;
    if bits.len() > available {
        return Err(StegoError::InsufficientCapacity {
            required: bits.len(),
            available,
        });
    }

    let bs = params.block_size;
    let total = bits.len();
    let mut block_bits = vec![0u8; bs * bs];
    let mut report = BpcsReport::default();
    let mut cursor = 0;

    for block in scan_order(img, params) {
        if cursor >= total {
            break;
        }
        cancel.check()?;

        read_block(img, block, bs, &mut block_bits);
        if complexity(&block_bits, bs) <= params.threshold {
            continue;
        }

        block_bits[0] = 0;
        for slot in block_bits.iter_mut().skip(1) {
            if cursor >= total {
                break;
            }
            *slot = bits.bit(cursor);
            cursor += 1;
        }
        if complexity(&block_bits, bs) <= params.threshold {
            conjugate(&mut block_bits, bs);
            report.blocks_conjugated += 1;
        }
        write_block(img, block, bs, &block_bits);
        report.blocks_used += 1;
    }

    report.bits_written = cursor;
    debug!(
        "bpcs: {} bits in {} blocks ({} conjugated)",
        report.bits_written, report.blocks_used, report.blocks_conjugated
    );
    Ok(report)
}

/// Feed the data bits of every eligible block to `de`; `true` once the
/// terminator has been seen.
pub fn extract_into(img: &ImageCarrier, params: &BpcsParams, de: &mut Deserializer) -> bool {
    let bs = params.block_size;
    let mut block_bits = vec![0u8; bs * bs];
    for block in scan_order(img, params) {
        read_block(img, block, bs, &mut block_bits);
        if complexity(&block_bits, bs) <= params.threshold {
            continue;
        }
        if block_bits[0] == 1 {
            conjugate(&mut block_bits, bs);
        }
        for &bit in &block_bits[1..] {
            if de.push_bit(bit) {
                return true;
            }
        }
    }
    false
}

/// Recover a payload embedded with [`embed`].
pub fn extract(img: &ImageCarrier, params: &BpcsParams) -> Result<Vec<u8>> {
    check_params(params)?;
    let mut de = Deserializer::new();
    extract_into(img, params, &mut de);
    de.finish()
}
