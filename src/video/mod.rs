pub mod decoder;
pub mod encoder;
pub mod sequence;

use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, warn};

use crate::config::VIDEO_CHANNELS;
use crate::error::{Result, StegoError};

/// Stream parameters of a video carrier, as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Frame rate as ffprobe reports it, e.g. `30000/1001`.
    pub frame_rate: String,
    pub frame_count: usize,
    pub has_audio: bool,
}

impl VideoInfo {
    /// Elements (RGB bytes) in one frame.
    pub fn frame_elements(&self) -> usize {
        self.width as usize * self.height as usize * VIDEO_CHANNELS
    }

    /// Bits the whole video can hold at `bit_width` bits per element.
    pub fn capacity(&self, bit_width: u8) -> usize {
        self.frame_elements() * self.frame_count * bit_width as usize
    }
}

fn ffprobe(args: &[&str], path: &Path) -> Result<String> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            StegoError::CarrierRead(format!("failed to run ffprobe — is ffmpeg installed? {e}"))
        })?;
    if !output.status.success() {
        return Err(StegoError::CarrierRead(format!(
            "ffprobe rejected {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Probe a video file, counting its frames. Counting decodes the whole
/// stream once; use [`probe_dimensions`] when the count is not needed.
pub fn probe(path: &Path) -> Result<VideoInfo> {
    let info = probe_stream(path, true)?;
    if info.frame_count == 0 {
        warn!("{} reports no decodable frames", path.display());
    }
    Ok(info)
}

/// Probe geometry and audio only; `frame_count` is whatever the container
/// header claims (0 when absent).
pub fn probe_dimensions(path: &Path) -> Result<VideoInfo> {
    probe_stream(path, false)
}

fn probe_stream(path: &Path, count_frames: bool) -> Result<VideoInfo> {
    let mut args = vec!["-select_streams", "v:0"];
    if count_frames {
        args.extend([
            "-count_frames",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_read_frames",
        ]);
    } else {
        args.extend(["-show_entries", "stream=width,height,r_frame_rate,nb_frames"]);
    }
    args.extend(["-of", "default=noprint_wrappers=1"]);
    let video = ffprobe(&args, path)?;
    let mut info = parse_stream_entries(&video)?;

    let audio = ffprobe(
        &[
            "-select_streams",
            "a",
            "-show_entries",
            "stream=index",
            "-of",
            "csv=p=0",
        ],
        path,
    )?;
    info.has_audio = !audio.trim().is_empty();
    debug!("probed {}: {:?}", path.display(), info);
    Ok(info)
}

fn parse_stream_entries(text: &str) -> Result<VideoInfo> {
    let mut width = None;
    let mut height = None;
    let mut frame_rate = None;
    let mut frame_count = None;
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "width" => width = value.parse::<u32>().ok(),
            "height" => height = value.parse::<u32>().ok(),
            "r_frame_rate" => frame_rate = Some(value.to_string()),
            "nb_read_frames" | "nb_frames" => frame_count = value.parse::<usize>().ok(),
            _ => {}
        }
    }

    let (Some(width), Some(height)) = (width, height) else {
        return Err(StegoError::CarrierRead("no video stream found".into()));
    };
    Ok(VideoInfo {
        width,
        height,
        frame_rate: frame_rate.unwrap_or_else(|| "30/1".to_string()),
        frame_count: frame_count.unwrap_or(0),
        has_audio: false,
    })
}
