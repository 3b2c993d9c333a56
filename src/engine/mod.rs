pub mod bpcs;
pub mod lsb;

use log::info;

use crate::bitstream;
use crate::cancel::CancelToken;
use crate::capacity;
use crate::carrier::Carrier;
use crate::config::{StegConfig, Strategy};
use crate::error::Result;
use crate::video::sequence;
use bpcs::BpcsParams;

/// Summary of a successful embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeReport {
    /// Payload plus terminator, in bits.
    pub bits_written: usize,
    /// Carrier capacity under the parameters used.
    pub capacity: usize,
    /// Video only: frames that received payload bits.
    pub frames_touched: Option<usize>,
}

/// Hide `payload` in `carrier`.
///
/// Capacity and parameters are validated before any element changes, so on
/// error the carrier is exactly as it was (cancellation excepted: a
/// cancelled in-memory carrier may be partly written and must be discarded).
pub fn encode(
    carrier: &mut Carrier,
    payload: &[u8],
    cfg: &StegConfig,
    cancel: &CancelToken,
) -> Result<EncodeReport> {
    let (required, available) = capacity::validate(payload, carrier, cfg)?;
    let bits = bitstream::serialize(payload);
    debug_assert_eq!(bits.len(), required);

    let mut frames_touched = None;
    match (carrier, cfg.strategy) {
        (Carrier::Image(img), Strategy::Bpcs) => {
            bpcs::embed(img, &bits, &BpcsParams::from(cfg), cancel)?;
        }
        (Carrier::Image(img), Strategy::Lsb) => {
            lsb::embed(img, &bits, cfg.bit_width, cancel)?;
        }
        (Carrier::Audio(audio), _) => {
            lsb::embed(audio, &bits, cfg.bit_width, cancel)?;
        }
        (Carrier::Frames(frames), _) => {
            frames_touched = Some(sequence::embed_frames(frames, &bits, cfg.bit_width, cancel)?);
        }
    }

    info!(
        "embedded {} payload bytes ({} of {} bits, {} x{})",
        payload.len(),
        required,
        available,
        cfg.strategy,
        cfg.bit_width
    );
    Ok(EncodeReport {
        bits_written: required,
        capacity: available,
        frames_touched,
    })
}

/// Recover the payload hidden in `carrier`.
pub fn decode(carrier: &Carrier, cfg: &StegConfig) -> Result<Vec<u8>> {
    cfg.check_carrier(carrier.kind())?;
    let payload = match (carrier, cfg.strategy) {
        (Carrier::Image(img), Strategy::Bpcs) => bpcs::extract(img, &BpcsParams::from(cfg))?,
        (Carrier::Image(img), Strategy::Lsb) => lsb::extract(img, cfg.bit_width)?,
        (Carrier::Audio(audio), _) => lsb::extract(audio, cfg.bit_width)?,
        (Carrier::Frames(frames), _) => {
            sequence::extract_frames(frames.iter().map(Ok), cfg.bit_width, &CancelToken::new())?
        }
    };
    info!("recovered {} payload bytes", payload.len());
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::{AudioCarrier, ImageCarrier};
    use crate::error::StegoError;
    use hound::{SampleFormat, WavSpec};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen()).collect()
    }

    fn image(width: u32, height: u32, seed: u64) -> Carrier {
        let samples = noise((width * height * 3) as usize, seed);
        Carrier::Image(ImageCarrier::from_raw(width, height, 3, samples).unwrap())
    }

    fn audio(samples: usize) -> Carrier {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        Carrier::Audio(AudioCarrier::from_pcm(spec, noise(samples * 2, 5)).unwrap())
    }

    #[test]
    fn test_roundtrip_all_carriers() {
        let payload = noise(300, 42);
        let cancel = CancelToken::new();
        let frames = (0..4)
            .map(|i| ImageCarrier::from_raw(32, 32, 3, noise(32 * 32 * 3, i)).unwrap())
            .collect();

        let cases = vec![
            (image(64, 64, 1), StegConfig::lsb(1)),
            (image(64, 64, 2), StegConfig::lsb(4)),
            (image(128, 128, 3), StegConfig::bpcs(2)),
            (audio(8000), StegConfig::lsb(2)),
            (Carrier::Frames(frames), StegConfig::lsb(1)),
        ];
        for (mut carrier, cfg) in cases {
            let kind = carrier.kind();
            encode(&mut carrier, &payload, &cfg, &cancel).unwrap();
            assert_eq!(decode(&carrier, &cfg).unwrap(), payload, "{kind} {}", cfg.strategy);
        }
    }

    #[test]
    fn test_empty_payload() {
        let original = image(16, 16, 8);
        let mut carrier = original.clone();
        let report = encode(&mut carrier, &[], &StegConfig::lsb(1), &CancelToken::new()).unwrap();
        assert_eq!(report.bits_written, 64);
        assert!(decode(&carrier, &StegConfig::lsb(1)).unwrap().is_empty());

        let (Carrier::Image(a), Carrier::Image(b)) = (&original, &carrier) else {
            unreachable!()
        };
        assert_eq!(&a.samples()[64..], &b.samples()[64..]);
    }

    #[test]
    fn test_bpcs_on_audio_rejected_before_mutation() {
        let original = audio(1000);
        let mut carrier = original.clone();
        let err =
            encode(&mut carrier, b"x", &StegConfig::bpcs(1), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, StegoError::InvalidParameters(_)));
        assert!(matches!(
            decode(&carrier, &StegConfig::bpcs(1)),
            Err(StegoError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_oversized_payload_leaves_carrier_untouched() {
        let original = image(8, 8, 4);
        let mut carrier = original.clone();
        let err = encode(&mut carrier, &[1u8; 100], &StegConfig::lsb(1), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, StegoError::InsufficientCapacity { .. }));
        let (Carrier::Image(a), Carrier::Image(b)) = (&original, &carrier) else {
            unreachable!()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_frames_report_touched() {
        let frames = (0..10)
            .map(|i| ImageCarrier::from_raw(8, 8, 3, noise(192, i)).unwrap())
            .collect();
        let mut carrier = Carrier::Frames(frames);
        let report = encode(&mut carrier, &[7u8; 20], &StegConfig::lsb(1), &CancelToken::new())
            .unwrap();
        // 224 bits over 192-bit frames
        assert_eq!(report.frames_touched, Some(2));
    }
}
