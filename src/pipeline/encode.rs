use std::fs;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::bitstream;
use crate::cancel::CancelToken;
use crate::capacity;
use crate::carrier::{Carrier, CarrierKind, ImageCarrier};
use crate::config::StegConfig;
use crate::engine::{self, EncodeReport};
use crate::error::StegoError;
use crate::video::{self, decoder::FrameReader, encoder::FrameWriter, sequence};

use super::{load_carrier, persist, temp_output};

/// Full encode pipeline: carrier file + payload file -> stego carrier file.
///
/// The output is written to a temporary file beside `output_path` and only
/// renamed into place once everything succeeded; a failed or cancelled run
/// leaves no output behind.
pub fn encode_file(
    carrier_path: &Path,
    payload_path: &Path,
    output_path: &Path,
    cfg: &StegConfig,
    cancel: &CancelToken,
) -> Result<EncodeReport> {
    let kind = CarrierKind::detect(carrier_path)?;
    kind.ensure_lossless_output(output_path)?;
    cfg.check_carrier(kind)?;

    let payload = fs::read(payload_path)
        .with_context(|| format!("failed to read payload {}", payload_path.display()))?;
    info!(
        "hiding {} ({} bytes) in {} carrier {} [{} x{}]",
        payload_path.display(),
        payload.len(),
        kind,
        carrier_path.display(),
        cfg.strategy,
        cfg.bit_width
    );

    let report = match kind {
        CarrierKind::Video => encode_video(carrier_path, &payload, output_path, cfg, cancel)?,
        _ => {
            let mut carrier = load_carrier(carrier_path, kind)?;
            let report = engine::encode(&mut carrier, &payload, cfg, cancel)?;
            write_carrier(&carrier, output_path)?;
            report
        }
    };

    info!("encode complete! output: {}", output_path.display());
    Ok(report)
}

/// Write an in-memory image or audio carrier atomically.
fn write_carrier(carrier: &Carrier, output_path: &Path) -> Result<()> {
    let mut tmp = temp_output(output_path)?;
    match carrier {
        Carrier::Image(img) => {
            let format = ImageFormat::from_path(output_path).map_err(|e| {
                StegoError::UnsupportedCarrierType(format!("{}: {e}", output_path.display()))
            })?;
            img.write_to(tmp.as_file_mut(), format)?;
        }
        Carrier::Audio(audio) => {
            audio.write_to(BufWriter::new(tmp.as_file_mut()))?;
        }
        Carrier::Frames(_) => anyhow::bail!("frame sequences are written by the video pipeline"),
    }
    persist(tmp, output_path)
}

/// Stream a video through ffmpeg, embedding into frames in parallel batches.
///
/// Capacity comes from the probed frame count, so it is checked before the
/// first frame is decoded. Each frame's slice of the bit sequence is planned
/// up front; frames after the last slice are copied through unmodified.
fn encode_video(
    input_path: &Path,
    payload: &[u8],
    output_path: &Path,
    cfg: &StegConfig,
    cancel: &CancelToken,
) -> Result<EncodeReport> {
    let info = video::probe(input_path)?;
    let required = capacity::required_bits(payload)?;
    let available = info.capacity(cfg.bit_width);
    capacity::fits(required, available)?;

    let bits = bitstream::serialize(payload);
    let plan = sequence::plan_frames(
        std::iter::repeat(info.frame_elements()).take(info.frame_count),
        cfg.bit_width,
        bits.len(),
    );
    info!(
        "payload needs {} of {} bits, spanning {} of {} frames",
        required,
        available,
        plan.len(),
        info.frame_count
    );

    let tmp = temp_output(output_path)?;
    let mut reader = FrameReader::open(input_path, &info)?;
    let mut writer = FrameWriter::create(tmp.path(), &info, input_path)?;

    let progress = ProgressBar::new(info.frame_count as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta})")?
            .progress_chars("##-"),
    );

    // Decode in batches matching the rayon pool so all cores embed at once
    // while holding at most `threads * frame_size` bytes of pixels.
    let batch_size = rayon::current_num_threads();
    let mut frame_idx = 0;
    loop {
        cancel.check()?;
        let mut batch: Vec<ImageCarrier> = reader
            .by_ref()
            .take(batch_size)
            .collect::<crate::Result<_>>()?;
        if batch.is_empty() {
            break;
        }
        if frame_idx < plan.len() {
            sequence::embed_planned(&mut batch, frame_idx, &plan, &bits, cfg.bit_width, cancel)?;
        }
        for frame in &batch {
            writer.write_frame(frame)?;
        }
        frame_idx += batch.len();
        progress.inc(batch.len() as u64);
    }
    progress.finish_with_message("frames complete");

    if frame_idx < plan.len() {
        return Err(StegoError::CarrierRead(format!(
            "video ended after {frame_idx} frames, payload needed {}",
            plan.len()
        ))
        .into());
    }

    writer.finish()?;
    drop(reader);
    persist(tmp, output_path)?;

    Ok(EncodeReport {
        bits_written: required,
        capacity: available,
        frames_touched: Some(plan.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::decode::decode_file;
    use crate::pipeline::tests::write_noise_png;
    use hound::{SampleFormat, WavSpec, WavWriter};

    #[test]
    fn test_png_encode_decode_files() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.png");
        let payload = dir.path().join("payload.bin");
        let stego = dir.path().join("stego.png");
        let recovered = dir.path().join("recovered.bin");
        write_noise_png(&cover, 40, 30);
        fs::write(&payload, [0u8, 1, 2, 0, 255, 0]).unwrap();

        let cfg = StegConfig::lsb(3);
        encode_file(&cover, &payload, &stego, &cfg, &CancelToken::new()).unwrap();
        decode_file(&stego, &recovered, &cfg, &CancelToken::new()).unwrap();
        assert_eq!(fs::read(&recovered).unwrap(), fs::read(&payload).unwrap());
    }

    #[test]
    fn test_wav_encode_decode_files() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.wav");
        let payload = dir.path().join("payload.txt");
        let stego = dir.path().join("stego.wav");
        let recovered = dir.path().join("recovered.txt");

        let spec = WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&cover, spec).unwrap();
        for i in 0..4000i32 {
            writer.write_sample(((i * 97) % 20000 - 10000) as i16).unwrap();
        }
        writer.finalize().unwrap();
        fs::write(&payload, "a hidden note inside an audio track").unwrap();

        let cfg = StegConfig::lsb(1);
        encode_file(&cover, &payload, &stego, &cfg, &CancelToken::new()).unwrap();
        decode_file(&stego, &recovered, &cfg, &CancelToken::new()).unwrap();
        assert_eq!(fs::read(&recovered).unwrap(), fs::read(&payload).unwrap());

        let reader = hound::WavReader::open(&stego).unwrap();
        assert_eq!(reader.spec(), spec);
        assert_eq!(reader.len(), 4000);
    }

    #[test]
    fn test_oversized_payload_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.png");
        let payload = dir.path().join("payload.bin");
        let stego = dir.path().join("stego.png");
        write_noise_png(&cover, 8, 8);
        fs::write(&payload, vec![9u8; 64]).unwrap();

        let err = encode_file(&cover, &payload, &stego, &StegConfig::lsb(1), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StegoError>(),
            Some(StegoError::InsufficientCapacity { .. })
        ));
        assert!(!stego.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_cancelled_encode_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.png");
        let payload = dir.path().join("payload.bin");
        let stego = dir.path().join("stego.png");
        write_noise_png(&cover, 32, 32);
        fs::write(&payload, b"never written").unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = encode_file(&cover, &payload, &stego, &StegConfig::lsb(1), &cancel).unwrap_err();
        assert!(matches!(err.downcast_ref::<StegoError>(), Some(StegoError::Cancelled)));
        assert!(!stego.exists());
    }

    #[test]
    fn test_lossy_output_refused() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.png");
        let payload = dir.path().join("payload.bin");
        write_noise_png(&cover, 8, 8);
        fs::write(&payload, b"x").unwrap();

        let err = encode_file(
            &cover,
            &payload,
            &dir.path().join("stego.jpg"),
            &StegConfig::lsb(1),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StegoError>(),
            Some(StegoError::UnsupportedCarrierType(_))
        ));
    }
}
