use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use log::{debug, info};

use crate::carrier::ImageCarrier;
use crate::config::{VIDEO_CHANNELS, VIDEO_PIXEL_FORMAT};
use crate::error::{Result, StegoError};
use crate::video::VideoInfo;

/// Pulls raw RGB frames out of a video file through ffmpeg, one at a time.
///
/// Frames are only decoded as the iterator is advanced; dropping the reader
/// stops ffmpeg, so a decode that finds its payload early never touches
/// the rest of the file.
pub struct FrameReader {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    frames_read: usize,
    done: bool,
}

impl FrameReader {
    pub fn open(input_path: &Path, info: &VideoInfo) -> Result<Self> {
        info!("decoding video: {}", input_path.display());

        let mut child = Command::new("ffmpeg")
            .arg("-i")
            .arg(input_path)
            .args([
                "-map",
                "0:v:0",
                "-f",
                "rawvideo",
                "-pix_fmt",
                VIDEO_PIXEL_FORMAT,
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                StegoError::CarrierRead(format!(
                    "failed to spawn ffmpeg — is ffmpeg installed? {e}"
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StegoError::CarrierRead("ffmpeg stdout unavailable".into()))?;

        Ok(Self {
            child,
            stdout,
            width: info.width,
            height: info.height,
            frames_read: 0,
            done: false,
        })
    }

    fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * VIDEO_CHANNELS
    }

    fn next_frame(&mut self) -> Result<Option<ImageCarrier>> {
        let mut buf = vec![0u8; self.frame_size()];
        let got_frame = read_exact_or_eof(&mut self.stdout, &mut buf).map_err(|e| {
            StegoError::CarrierRead(format!("reading frame {}: {e}", self.frames_read))
        })?;
        if !got_frame {
            let status = self.child.wait()?;
            if !status.success() {
                return Err(StegoError::CarrierRead(format!(
                    "ffmpeg decode exited with status: {status}"
                )));
            }
            debug!("decoder reached end of stream after {} frames", self.frames_read);
            return Ok(None);
        }
        self.frames_read += 1;
        ImageCarrier::from_raw(self.width, self.height, VIDEO_CHANNELS as u8, buf).map(Some)
    }
}

impl Iterator for FrameReader {
    type Item = Result<ImageCarrier>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Read exactly `buf.len()` bytes, returning Ok(false) on clean EOF.
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                } else {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "partial frame read",
                    ));
                }
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
