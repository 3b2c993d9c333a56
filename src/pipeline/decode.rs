use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::cancel::CancelToken;
use crate::carrier::{CarrierKind, ImageCarrier};
use crate::config::StegConfig;
use crate::engine;
use crate::video::{self, decoder::FrameReader, sequence};

use super::{load_carrier, persist, temp_output};

/// Recover the payload hidden in the carrier file at `path`.
///
/// Video is decoded lazily: ffmpeg is stopped as soon as the terminator turns
/// up, so a short payload in a long video only costs its first few frames.
pub fn decode_carrier(path: &Path, cfg: &StegConfig, cancel: &CancelToken) -> Result<Vec<u8>> {
    let kind = CarrierKind::detect(path)?;
    cfg.check_carrier(kind)?;
    info!("extracting from {} carrier {}", kind, path.display());

    let payload = match kind {
        CarrierKind::Video => {
            let info = video::probe_dimensions(path)?;
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner().template("{spinner} {pos} frames scanned")?,
            );

            let reader = FrameReader::open(path, &info)?;
            scan_frames(reader, &spinner, cfg.bit_width, cancel)?
        }
        _ => {
            cancel.check()?;
            let carrier = load_carrier(path, kind)?;
            engine::decode(&carrier, cfg)?
        }
    };
    Ok(payload)
}

/// Extract from a frame source while ticking `spinner`, which is cleared
/// whether or not a payload turns up.
fn scan_frames<I>(
    frames: I,
    spinner: &ProgressBar,
    bit_width: u8,
    cancel: &CancelToken,
) -> crate::Result<Vec<u8>>
where
    I: IntoIterator<Item = crate::Result<ImageCarrier>>,
{
    let frames = frames.into_iter().inspect(|_| spinner.inc(1));
    let scanned = sequence::extract_frames(frames, bit_width, cancel);
    spinner.finish_and_clear();
    scanned
}

/// Full decode pipeline: stego carrier file -> payload file. Returns the
/// payload size in bytes.
pub fn decode_file(
    carrier_path: &Path,
    output_path: &Path,
    cfg: &StegConfig,
    cancel: &CancelToken,
) -> Result<usize> {
    let payload = decode_carrier(carrier_path, cfg, cancel)?;

    let mut tmp = temp_output(output_path)?;
    tmp.write_all(&payload)
        .with_context(|| format!("failed to write {}", output_path.display()))?;
    persist(tmp, output_path)?;

    info!(
        "decode complete! {} bytes -> {}",
        payload.len(),
        output_path.display()
    );
    Ok(payload.len())
}
