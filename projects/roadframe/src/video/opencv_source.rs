use super::{Frame, VideoSource};
use crate::error::{Error, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_POS_FRAMES},
};
use std::path::Path;

/// Skipping forward by grabbing is cheaper than a container seek for short
/// gaps; past this many frames we seek instead.
const MAX_GRAB_GAP: usize = 120;

/// Video file decoded through OpenCV's `VideoCapture`.
pub struct OpencvSource {
    capture: VideoCapture,
    fps: f64,
    total_frames: usize,
    /// Index of the frame the next `read` returns.
    position: usize,
}

impl OpencvSource {
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::input(format!("Non UTF-8 video path: {}", path.display())))?;
        if !path.exists() {
            return Err(Error::input(format!("Video file not found: {}", path_str)));
        }

        let capture = VideoCapture::from_file(path_str, CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::input(format!(
                "Error: Cannot read video file {}",
                path_str
            )));
        }

        let fps = capture.get(CAP_PROP_FPS)?;
        let raw_count = capture.get(CAP_PROP_FRAME_COUNT)?;
        let total_frames = if raw_count > 0.0 { raw_count as usize } else { 0 };
        let duration_secs = if fps > 0.0 {
            total_frames as f64 / fps
        } else {
            0.0
        };

        tracing::info!(
            "OpencvSource: opened {}, duration={:.2}s, fps={:.2}, stream_frames={}",
            path_str,
            duration_secs,
            fps,
            total_frames
        );

        Ok(Self {
            capture,
            fps,
            total_frames,
            position: 0,
        })
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        let success = self.capture.read(&mut mat)?;
        if !success || mat.empty() {
            // The decoder may or may not have consumed the bad frame.
            let reported = self.capture.get(CAP_PROP_POS_FRAMES)?;
            if reported >= 0.0 {
                self.position = reported as usize;
            }
            return Ok(None);
        }
        let frame = Frame {
            index: self.position,
            mat,
        };
        self.position += 1;
        Ok(Some(frame))
    }
}

impl VideoSource for OpencvSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> usize {
        self.total_frames
    }

    fn seek_and_read(&mut self, index: usize) -> Result<Option<Frame>> {
        if index < self.position || index - self.position > MAX_GRAB_GAP {
            self.capture.set(CAP_PROP_POS_FRAMES, index as f64)?;
            self.position = index;
        } else {
            while self.position < index {
                if !self.capture.grab()? {
                    return Ok(None);
                }
                self.position += 1;
            }
        }

        self.read_frame()
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        self.read_frame()
    }
}

impl Drop for OpencvSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("OpencvSource: failed to release capture: {}", e);
        }
    }
}
