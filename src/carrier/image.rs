//! Raster image carriers.
//!
//! Elements are the colour channel bytes of each pixel, row-major, in
//! R,G,B order (or a single luma byte for grayscale images). Buffers that
//! arrive in B,G,R order are normalised here and nowhere else. An alpha
//! channel is carried alongside and written back untouched.

use std::io::{Seek, Write};
use std::path::Path;

use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage};

use super::ElementSequence;
use crate::error::{Result, StegoError};

/// Native channel order of an interleaved three-channel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCarrier {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl ImageCarrier {
    /// Wrap an interleaved buffer with 1 (luma) or 3 (RGB) channels.
    pub fn from_raw(width: u32, height: u32, channels: u8, samples: Vec<u8>) -> Result<Self> {
        if channels != 1 && channels != 3 {
            return Err(StegoError::UnsupportedCarrierType(format!(
                "{channels}-channel pixel buffers are not supported"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() != expected {
            return Err(StegoError::CarrierRead(format!(
                "pixel buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            samples,
            alpha: None,
        })
    }

    /// Wrap a three-channel buffer stored in `order`, normalising to RGB.
    pub fn from_interleaved(
        width: u32,
        height: u32,
        mut samples: Vec<u8>,
        order: ChannelOrder,
    ) -> Result<Self> {
        if order == ChannelOrder::Bgr {
            for px in samples.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
        }
        Self::from_raw(width, height, 3, samples)
    }

    /// Interleaved samples in the requested channel order.
    pub fn to_interleaved(&self, order: ChannelOrder) -> Vec<u8> {
        let mut out = self.samples.clone();
        if order == ChannelOrder::Bgr && self.channels == 3 {
            for px in out.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
        }
        out
    }

    pub fn from_dynamic(img: DynamicImage) -> Result<Self> {
        let (width, height) = (img.width(), img.height());
        let (channels, samples, alpha) = match img {
            DynamicImage::ImageLuma8(buf) => (1, buf.into_raw(), None),
            DynamicImage::ImageRgb8(buf) => (3, buf.into_raw(), None),
            DynamicImage::ImageLumaA8(buf) => {
                let (luma, alpha) = split_alpha(buf.as_raw(), 1);
                (1, luma, Some(alpha))
            }
            DynamicImage::ImageRgba8(buf) => {
                let (rgb, alpha) = split_alpha(buf.as_raw(), 3);
                (3, rgb, Some(alpha))
            }
            other => {
                return Err(StegoError::UnsupportedCarrierType(format!(
                    "pixel format {:?} is not supported, only 8-bit gray/RGB(A)",
                    other.color()
                )))
            }
        };
        let mut carrier = Self::from_raw(width, height, channels, samples)?;
        carrier.alpha = alpha;
        Ok(carrier)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .map_err(|e| StegoError::CarrierRead(format!("{}: {e}", path.display())))?;
        Self::from_dynamic(img)
    }

    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let bad = || StegoError::CarrierWrite("pixel buffer does not match dimensions".into());
        let img = match (self.channels, &self.alpha) {
            (1, None) => DynamicImage::ImageLuma8(
                GrayImage::from_raw(w, h, self.samples.clone()).ok_or_else(bad)?,
            ),
            (3, None) => DynamicImage::ImageRgb8(
                RgbImage::from_raw(w, h, self.samples.clone()).ok_or_else(bad)?,
            ),
            (1, Some(alpha)) => {
                let merged = merge_alpha(&self.samples, alpha, 1);
                DynamicImage::ImageLumaA8(GrayAlphaImage::from_raw(w, h, merged).ok_or_else(bad)?)
            }
            (_, Some(alpha)) => DynamicImage::ImageRgba8(
                RgbaImage::from_raw(w, h, merge_alpha(&self.samples, alpha, 3)).ok_or_else(bad)?,
            ),
            _ => return Err(bad()),
        };
        Ok(img)
    }

    /// Encode into `writer` using `format`.
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W, format: ImageFormat) -> Result<()> {
        self.to_dynamic()?
            .write_to(writer, format)
            .map_err(|e| StegoError::CarrierWrite(e.to_string()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Channel `c` of the pixel at (`x`, `y`).
    #[inline]
    pub fn sample(&self, x: usize, y: usize, c: usize) -> u8 {
        self.samples[self.offset(x, y, c)]
    }

    #[inline]
    pub fn set_sample(&mut self, x: usize, y: usize, c: usize, value: u8) {
        let idx = self.offset(x, y, c);
        self.samples[idx] = value;
    }

    #[inline]
    fn offset(&self, x: usize, y: usize, c: usize) -> usize {
        (y * self.width as usize + x) * self.channels as usize + c
    }
}

impl ElementSequence for ImageCarrier {
    fn element_count(&self) -> usize {
        self.samples.len()
    }

    fn element(&self, index: usize) -> u8 {
        self.samples[index]
    }

    fn set_element(&mut self, index: usize, value: u8) {
        self.samples[index] = value;
    }
}

fn split_alpha(raw: &[u8], colour: usize) -> (Vec<u8>, Vec<u8>) {
    let stride = colour + 1;
    let pixels = raw.len() / stride;
    let mut samples = Vec::with_capacity(pixels * colour);
    let mut alpha = Vec::with_capacity(pixels);
    for px in raw.chunks_exact(stride) {
        samples.extend_from_slice(&px[..colour]);
        alpha.push(px[colour]);
    }
    (samples, alpha)
}

fn merge_alpha(samples: &[u8], alpha: &[u8], colour: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() + alpha.len());
    for (px, a) in samples.chunks_exact(colour).zip(alpha) {
        out.extend_from_slice(px);
        out.push(*a);
    }
    out
}
