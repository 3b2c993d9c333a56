use std::borrow::Borrow;

use log::debug;
use rayon::prelude::*;

use crate::bitstream::{BitSequence, Deserializer};
use crate::cancel::CancelToken;
use crate::carrier::{ElementSequence, ImageCarrier};
use crate::config;
use crate::engine::lsb;
use crate::error::{Result, StegoError};

/// The part of the bit sequence one frame carries: bits from `bit_offset`
/// until the frame is full or the sequence ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlice {
    pub frame: usize,
    pub bit_offset: usize,
}

/// Assign each frame its starting offset into a `total_bits` sequence.
///
/// Only frames that receive at least one bit are listed; slice `i` always
/// belongs to frame `i`.
pub fn plan_frames<I>(frame_elements: I, bit_width: u8, total_bits: usize) -> Vec<FrameSlice>
where
    I: IntoIterator<Item = usize>,
{
    let mut plan = Vec::new();
    let mut offset = 0;
    for (frame, elements) in frame_elements.into_iter().enumerate() {
        if offset >= total_bits {
            break;
        }
        plan.push(FrameSlice {
            frame,
            bit_offset: offset,
        });
        offset += elements * bit_width as usize;
    }
    plan
}

/// Bits a frame sequence can hold.
pub fn capacity(frames: &[ImageCarrier], bit_width: u8) -> usize {
    frames.iter().map(|f| lsb::capacity(f, bit_width)).sum()
}

/// Embed the planned slices that fall in `batch`, whose first frame has
/// global index `first_frame`. Frames are mutated in parallel.
pub fn embed_planned(
    batch: &mut [ImageCarrier],
    first_frame: usize,
    plan: &[FrameSlice],
    bits: &BitSequence,
    bit_width: u8,
    cancel: &CancelToken,
) -> Result<()> {
    batch
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(i, frame)| match plan.get(first_frame + i) {
            Some(slice) => {
                cancel.check()?;
                lsb::embed_slice(frame, bits, slice.bit_offset, bit_width, cancel).map(|_| ())
            }
            None => Ok(()),
        })
}

/// Embed `bits` across `frames` in order, stopping once the sequence is
/// written. Returns the number of frames touched; the rest are unchanged.
pub fn embed_frames(
    frames: &mut [ImageCarrier],
    bits: &BitSequence,
    bit_width: u8,
    cancel: &CancelToken,
) -> Result<usize> {
    config::check_bit_width(bit_width)?;
    let available = capacity(frames, bit_width);
    if bits.len() > available {
        return Err(StegoError::InsufficientCapacity {
            required: bits.len(),
            available,
        });
    }

    let plan = plan_frames(frames.iter().map(|f| f.element_count()), bit_width, bits.len());
    embed_planned(frames, 0, &plan, bits, bit_width, cancel)?;
    debug!("frames: payload spans {} of {} frames", plan.len(), frames.len());
    Ok(plan.len())
}

/// Extract a payload from frames pulled lazily in order.
///
/// Stops pulling at the frame where the terminator is recognized, so later
/// frames are never decoded. Frames may be owned (a decoder) or borrowed
/// (an in-memory sequence).
pub fn extract_frames<I, F>(frames: I, bit_width: u8, cancel: &CancelToken) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = Result<F>>,
    F: Borrow<ImageCarrier>,
{
    config::check_bit_width(bit_width)?;
    let mut de = Deserializer::new();
    for (index, frame) in frames.into_iter().enumerate() {
        cancel.check()?;
        let frame = frame?;
        let frame: &ImageCarrier = frame.borrow();
        if lsb::extract_into(frame, bit_width, &mut de) {
            debug!("frames: terminator found in frame {}", index);
            break;
        }
    }
    de.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream;
    use std::cell::Cell;

    fn frame(seed: u8) -> ImageCarrier {
        let samples = (0..8 * 4 * 3).map(|i| (i as u8).wrapping_mul(seed)).collect();
        ImageCarrier::from_raw(8, 4, 3, samples).unwrap()
    }

    fn frames(count: u8) -> Vec<ImageCarrier> {
        (1..=count).map(frame).collect()
    }

    #[test]
    fn test_plan_offsets() {
        let plan = plan_frames(vec![10, 10, 10, 10], 2, 45);
        assert_eq!(
            plan,
            vec![
                FrameSlice { frame: 0, bit_offset: 0 },
                FrameSlice { frame: 1, bit_offset: 20 },
                FrameSlice { frame: 2, bit_offset: 40 },
            ]
        );
        assert!(plan_frames(vec![10, 10], 1, 0).is_empty());
    }

    #[test]
    fn test_early_stop_leaves_later_frames_identical() {
        // 96 elements per frame at 1 bit: a 14-byte payload (176 bits) needs 2 frames.
        let original = frames(10);
        let mut stego = original.clone();
        let payload = b"two frames max";
        let touched = embed_frames(
            &mut stego,
            &bitstream::serialize(payload),
            1,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(touched, 2);
        assert_eq!(&stego[2..], &original[2..]);

        let decoded = extract_frames(stego.into_iter().map(Ok), 1, &CancelToken::new()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_batched_embed_matches_whole_sequence() {
        let payload = b"batches of three frames";
        let bits = bitstream::serialize(payload);
        let cancel = CancelToken::new();

        let mut whole = frames(10);
        let touched = embed_frames(&mut whole, &bits, 1, &cancel).unwrap();

        let mut batched = frames(10);
        let plan = plan_frames(batched.iter().map(|f| f.element_count()), 1, bits.len());
        assert_eq!(plan.len(), touched);
        for (i, batch) in batched.chunks_mut(3).enumerate() {
            embed_planned(batch, i * 3, &plan, &bits, 1, &cancel).unwrap();
        }

        assert_eq!(batched, whole);
        let decoded = extract_frames(batched.iter().map(Ok), 1, &cancel).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_stops_pulling_frames() {
        let mut stego = frames(10);
        embed_frames(&mut stego, &bitstream::serialize(b"hi"), 2, &CancelToken::new()).unwrap();

        let pulled = Cell::new(0);
        let source = stego.into_iter().map(|f| {
            pulled.set(pulled.get() + 1);
            Ok(f)
        });
        assert_eq!(extract_frames(source, 2, &CancelToken::new()).unwrap(), b"hi");
        assert_eq!(pulled.get(), 1);
    }

    #[test]
    fn test_capacity_across_frames() {
        let mut stego = frames(3);
        assert_eq!(capacity(&stego, 1), 3 * 96);

        let payload = vec![0x33u8; 3 * 96 / 8 - 8];
        embed_frames(&mut stego, &bitstream::serialize(&payload), 1, &CancelToken::new()).unwrap();
        let decoded = extract_frames(stego.into_iter().map(Ok), 1, &CancelToken::new()).unwrap();
        assert_eq!(decoded, payload);

        let original = frames(3);
        let mut copy = original.clone();
        let err = embed_frames(
            &mut copy,
            &bitstream::serialize(&[0u8; 29]),
            1,
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, StegoError::InsufficientCapacity { .. }));
        assert_eq!(copy, original);
    }

    #[test]
    fn test_read_error_propagates() {
        let source = vec![Ok(frame(1)), Err(StegoError::CarrierRead("truncated".into()))];
        assert!(matches!(
            extract_frames(source, 1, &CancelToken::new()),
            Err(StegoError::CarrierRead(_))
        ));
    }

    #[test]
    fn test_no_payload_reports_missing_terminator() {
        let blank = vec![ImageCarrier::from_raw(8, 4, 3, vec![0; 96]).unwrap(); 4];
        assert!(matches!(
            extract_frames(blank.into_iter().map(Ok), 1, &CancelToken::new()),
            Err(StegoError::TerminatorNotFound)
        ));
    }
}
