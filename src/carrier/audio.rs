//! PCM WAV carriers.
//!
//! Elements are the sample bytes exactly as they sit in the `data` chunk:
//! little-endian, unsigned for 8-bit audio, interleaved by channel.

use std::io::{Read, Seek, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::ElementSequence;
use crate::error::{Result, StegoError};

#[derive(Debug, Clone, PartialEq)]
pub struct AudioCarrier {
    spec: WavSpec,
    pcm: Vec<u8>,
}

impl AudioCarrier {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path)
            .map_err(|e| StegoError::CarrierRead(format!("{}: {e}", path.display())))?;
        Self::from_wav(reader)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let reader = WavReader::new(reader).map_err(|e| StegoError::CarrierRead(e.to_string()))?;
        Self::from_wav(reader)
    }

    fn from_wav<R: Read>(reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let width = sample_width(&spec)?;
        let mut pcm = Vec::with_capacity(reader.len() as usize * width);
        for sample in reader.into_samples::<i32>() {
            let sample = sample.map_err(|e| StegoError::CarrierRead(e.to_string()))?;
            push_sample(&mut pcm, sample, width);
        }
        Ok(Self { spec, pcm })
    }

    /// Wrap raw little-endian PCM bytes described by `spec`.
    pub fn from_pcm(spec: WavSpec, pcm: Vec<u8>) -> Result<Self> {
        let width = sample_width(&spec)?;
        let frame = width * spec.channels as usize;
        if frame == 0 || pcm.len() % frame != 0 {
            return Err(StegoError::CarrierRead(format!(
                "{} PCM bytes is not a whole number of {frame}-byte frames",
                pcm.len()
            )));
        }
        Ok(Self { spec, pcm })
    }

    /// Write a WAV file with the original spec and the current samples.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let width = sample_width(&self.spec)?;
        let mut wav =
            WavWriter::new(writer, self.spec).map_err(|e| StegoError::CarrierWrite(e.to_string()))?;
        for chunk in self.pcm.chunks_exact(width) {
            wav.write_sample(read_sample(chunk))
                .map_err(|e| StegoError::CarrierWrite(e.to_string()))?;
        }
        wav.finalize()
            .map_err(|e| StegoError::CarrierWrite(e.to_string()))
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Bytes per sample.
    pub fn sample_width(&self) -> usize {
        self.spec.bits_per_sample as usize / 8
    }

    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }
}

impl ElementSequence for AudioCarrier {
    fn element_count(&self) -> usize {
        self.pcm.len()
    }

    fn element(&self, index: usize) -> u8 {
        self.pcm[index]
    }

    fn set_element(&mut self, index: usize, value: u8) {
        self.pcm[index] = value;
    }
}

fn sample_width(spec: &WavSpec) -> Result<usize> {
    if spec.sample_format != SampleFormat::Int {
        return Err(StegoError::UnsupportedCarrierType(
            "only integer PCM WAV is supported".into(),
        ));
    }
    match spec.bits_per_sample {
        8 | 16 | 24 | 32 => Ok(spec.bits_per_sample as usize / 8),
        bits => Err(StegoError::UnsupportedCarrierType(format!(
            "{bits}-bit PCM is not supported"
        ))),
    }
}

fn push_sample(pcm: &mut Vec<u8>, sample: i32, width: usize) {
    let mut buf = [0u8; 4];
    match width {
        // 8-bit WAV stores unsigned samples offset by 128
        1 => buf[0] = (sample as u8) ^ 0x80,
        2 => LittleEndian::write_i16(&mut buf, sample as i16),
        3 => LittleEndian::write_i24(&mut buf, sample),
        _ => LittleEndian::write_i32(&mut buf, sample),
    }
    pcm.extend_from_slice(&buf[..width]);
}

fn read_sample(bytes: &[u8]) -> i32 {
    match bytes.len() {
        1 => (bytes[0] ^ 0x80) as i8 as i32,
        2 => LittleEndian::read_i16(bytes) as i32,
        3 => LittleEndian::read_i24(bytes),
        _ => LittleEndian::read_i32(bytes),
    }
}
