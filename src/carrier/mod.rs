pub mod audio;
pub mod image;

use std::fmt;
use std::path::Path;

use crate::error::{Result, StegoError};

pub use self::audio::AudioCarrier;
pub use self::image::{ChannelOrder, ImageCarrier};

/// A carrier presented as one ordered run of 8-bit elements.
///
/// The order must be identical between the encoder and the decoder; every
/// adapter fixes it at construction time.
pub trait ElementSequence {
    fn element_count(&self) -> usize;
    fn element(&self, index: usize) -> u8;
    fn set_element(&mut self, index: usize, value: u8);
}

impl ElementSequence for [u8] {
    fn element_count(&self) -> usize {
        self.len()
    }

    fn element(&self, index: usize) -> u8 {
        self[index]
    }

    fn set_element(&mut self, index: usize, value: u8) {
        self[index] = value;
    }
}

impl ElementSequence for Vec<u8> {
    fn element_count(&self) -> usize {
        self.len()
    }

    fn element(&self, index: usize) -> u8 {
        self[index]
    }

    fn set_element(&mut self, index: usize, value: u8) {
        self[index] = value;
    }
}

/// The three supported carrier shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierKind {
    Image,
    Audio,
    Video,
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "bmp", "tif", "tiff", "tga", "ppm", "pgm", "pnm", "jpg", "jpeg", "webp",
];
const AUDIO_EXTENSIONS: &[&str] = &["wav"];
const VIDEO_EXTENSIONS: &[&str] = &["mkv", "avi", "mov", "mp4", "webm"];

// Containers that re-encode lossily and would wipe out embedded bits.
const LOSSY_OUTPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "webp", "mp4", "webm"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

impl CarrierKind {
    /// Classify a carrier file by its extension.
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = extension_of(path).ok_or_else(|| {
            StegoError::UnsupportedCarrierType(format!("{} has no extension", path.display()))
        })?;
        let ext = ext.as_str();
        if IMAGE_EXTENSIONS.contains(&ext) {
            Ok(CarrierKind::Image)
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            Ok(CarrierKind::Audio)
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Ok(CarrierKind::Video)
        } else {
            Err(StegoError::UnsupportedCarrierType(format!(
                "unrecognised extension .{ext}"
            )))
        }
    }

    /// Check that `path` names a lossless container of this kind.
    pub fn ensure_lossless_output(self, path: &Path) -> Result<()> {
        let kind = Self::detect(path)?;
        if kind != self {
            return Err(StegoError::UnsupportedCarrierType(format!(
                "cannot write a {self} carrier to {}",
                path.display()
            )));
        }
        if let Some(ext) = extension_of(path) {
            if LOSSY_OUTPUT_EXTENSIONS.contains(&ext.as_str()) {
                return Err(StegoError::UnsupportedCarrierType(format!(
                    ".{ext} is a lossy container and would destroy the payload"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for CarrierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarrierKind::Image => write!(f, "image"),
            CarrierKind::Audio => write!(f, "audio"),
            CarrierKind::Video => write!(f, "video"),
        }
    }
}

/// A decoded carrier held in memory.
#[derive(Debug, Clone)]
pub enum Carrier {
    Image(ImageCarrier),
    Audio(AudioCarrier),
    /// Video frames in presentation order.
    Frames(Vec<ImageCarrier>),
}

impl Carrier {
    pub fn kind(&self) -> CarrierKind {
        match self {
            Carrier::Image(_) => CarrierKind::Image,
            Carrier::Audio(_) => CarrierKind::Audio,
            Carrier::Frames(_) => CarrierKind::Video,
        }
    }

    /// Total elements across the whole carrier.
    pub fn element_count(&self) -> usize {
        match self {
            Carrier::Image(img) => img.element_count(),
            Carrier::Audio(audio) => audio.element_count(),
            Carrier::Frames(frames) => frames.iter().map(|f| f.element_count()).sum(),
        }
    }
}
