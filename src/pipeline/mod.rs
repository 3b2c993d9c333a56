pub mod decode;
pub mod encode;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::cancel::CancelToken;
use crate::capacity;
use crate::carrier::{AudioCarrier, Carrier, CarrierKind, ImageCarrier};
use crate::config::StegConfig;
use crate::video;

/// Result of an encode → decode verification.
pub struct RoundtripResult {
    /// SHA-256 hex digest of the payload file.
    pub original_hash: String,
    /// SHA-256 hex digest of the payload recovered from the stego output.
    pub decoded_hash: String,
    /// `true` if the hashes match (lossless round-trip).
    pub matched: bool,
}

/// Capacity of a carrier file under a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityReport {
    pub kind: CarrierKind,
    /// Payload plus terminator, in bits.
    pub bits: usize,
    /// Largest payload that fits, in bytes.
    pub max_payload_bytes: usize,
}

/// Encode `payload` into `carrier`, writing `output`, then decode `output`
/// again and compare SHA-256 digests of the payload and what came back.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use stegbits::{roundtrip, CancelToken, StegConfig};
///
/// let result = roundtrip(
///     Path::new("cover.png"),
///     Path::new("secret.txt"),
///     Path::new("stego.png"),
///     &StegConfig::lsb(2),
///     &CancelToken::new(),
/// ).unwrap();
///
/// assert!(result.matched, "{} != {}", result.original_hash, result.decoded_hash);
/// ```
pub fn roundtrip(
    carrier: &Path,
    payload: &Path,
    output: &Path,
    cfg: &StegConfig,
    cancel: &CancelToken,
) -> Result<RoundtripResult> {
    let original = fs::read(payload)
        .with_context(|| format!("failed to read payload {}", payload.display()))?;
    let original_hash = sha256_hex(&original);

    encode::encode_file(carrier, payload, output, cfg, cancel)?;
    let recovered = decode::decode_carrier(output, cfg, cancel)?;

    let decoded_hash = sha256_hex(&recovered);
    let matched = original_hash == decoded_hash;

    Ok(RoundtripResult {
        original_hash,
        decoded_hash,
        matched,
    })
}

/// Capacity of the carrier at `path`. Video frames are counted by ffprobe.
pub fn capacity_of_file(path: &Path, cfg: &StegConfig) -> Result<CapacityReport> {
    let kind = CarrierKind::detect(path)?;
    cfg.check_carrier(kind)?;
    let bits = match kind {
        CarrierKind::Video => video::probe(path)?.capacity(cfg.bit_width),
        _ => capacity::capacity(&load_carrier(path, kind)?, cfg)?,
    };
    Ok(CapacityReport {
        kind,
        bits,
        max_payload_bytes: capacity::max_payload_bytes(bits),
    })
}

/// Load an image or audio carrier fully into memory.
pub fn load_carrier(path: &Path, kind: CarrierKind) -> Result<Carrier> {
    let carrier = match kind {
        CarrierKind::Image => Carrier::Image(ImageCarrier::open(path)?),
        CarrierKind::Audio => Carrier::Audio(AudioCarrier::open(path)?),
        CarrierKind::Video => anyhow::bail!("video carriers are streamed, not loaded"),
    };
    Ok(carrier)
}

/// A temporary file next to `output`, so persisting it is an atomic rename.
pub(crate) fn temp_output(output: &Path) -> Result<NamedTempFile> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let suffix = output
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(".stegbits-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))
}

/// Move a finished temporary file over `output`.
pub(crate) fn persist(tmp: NamedTempFile, output: &Path) -> Result<()> {
    tmp.persist(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    pub(crate) fn write_noise_png(path: &Path, width: u32, height: u32) {
        let mut rng = StdRng::seed_from_u64(11);
        let img = ImageBuffer::from_fn(width, height, |_, _| {
            Rgb::<u8>([rng.gen(), rng.gen(), rng.gen()])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_roundtrip_png() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.png");
        let payload = dir.path().join("secret.bin");
        let output = dir.path().join("stego.png");
        write_noise_png(&cover, 64, 64);
        fs::write(&payload, b"verify me please").unwrap();

        let result = roundtrip(&cover, &payload, &output, &StegConfig::bpcs(1), &CancelToken::new())
            .unwrap();
        assert!(result.matched);
        assert_eq!(result.original_hash, sha256_hex(b"verify me please"));
    }

    #[test]
    fn test_capacity_of_png() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.png");
        write_noise_png(&cover, 10, 10);

        let report = capacity_of_file(&cover, &StegConfig::lsb(2)).unwrap();
        assert_eq!(report.kind, CarrierKind::Image);
        assert_eq!(report.bits, 600);
        assert_eq!(report.max_payload_bytes, 67);
    }

    #[test]
    fn test_temp_output_lives_beside_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.png");
        let tmp = temp_output(&target).unwrap();
        assert_eq!(tmp.path().parent(), Some(dir.path()));
        assert_eq!(tmp.path().extension().unwrap(), "png");
    }
}
