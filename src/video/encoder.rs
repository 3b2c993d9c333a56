use std::io::Write;
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};

use log::info;

use crate::carrier::{ChannelOrder, ImageCarrier};
use crate::config::{VIDEO_CODEC, VIDEO_PIXEL_FORMAT};
use crate::error::{Result, StegoError};
use crate::video::VideoInfo;

/// Feeds raw RGB frames to ffmpeg and muxes them losslessly (FFV1) with the
/// audio track of the source video, which is stream-copied untouched.
pub struct FrameWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    frames_written: usize,
}

impl FrameWriter {
    /// Start ffmpeg writing to `output_path`. `audio_source` is the original
    /// video; its audio (if any) is copied into the output.
    pub fn create(output_path: &Path, info: &VideoInfo, audio_source: &Path) -> Result<Self> {
        // Scale FFV1 slice count to available threads for better intra-frame
        // parallelism inside ffmpeg. Clamped to 16 (a reasonable FFV1 upper bound).
        let ffv1_slices = rayon::current_num_threads().min(16).to_string();

        let mut cmd = Command::new("ffmpeg");
        cmd.args([
            "-y",
            "-f",
            "rawvideo",
            "-pixel_format",
            VIDEO_PIXEL_FORMAT,
            "-video_size",
            &format!("{}x{}", info.width, info.height),
            "-framerate",
            &info.frame_rate,
            "-i",
            "pipe:0",
        ]);
        if info.has_audio {
            cmd.arg("-i")
                .arg(audio_source)
                .args(["-map", "0:v:0", "-map", "1:a?", "-c:a", "copy"]);
        }
        cmd.args([
            "-c:v",
            VIDEO_CODEC,
            "-level",
            "3",
            "-slices",
            &ffv1_slices,
            "-slicecrc",
            "1",
        ])
        .arg(output_path);

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                StegoError::CarrierWrite(format!(
                    "failed to spawn ffmpeg — is ffmpeg installed? {e}"
                ))
            })?;
        let stdin = child.stdin.take();

        info!(
            "encoding video: {} ({}x{} @ {} fps, audio: {})",
            output_path.display(),
            info.width,
            info.height,
            info.frame_rate,
            info.has_audio
        );
        Ok(Self {
            child,
            stdin,
            frames_written: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &ImageCarrier) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| StegoError::CarrierWrite("ffmpeg input already closed".into()))?;
        stdin
            .write_all(&frame.to_interleaved(ChannelOrder::Rgb))
            .map_err(|e| {
                StegoError::CarrierWrite(format!("failed to write frame data to ffmpeg: {e}"))
            })?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close the pipe and wait for ffmpeg to finish the container.
    pub fn finish(mut self) -> Result<usize> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if !status.success() {
            return Err(StegoError::CarrierWrite(format!(
                "ffmpeg exited with status: {status}"
            )));
        }
        info!("video encoding complete: {} frames", self.frames_written);
        Ok(self.frames_written)
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        // Only reached without `finish` on error or cancellation.
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
