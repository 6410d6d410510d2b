use super::{Frame, VideoSource};
use crate::control::JobControl;
use crate::error::{Error, Result};
use opencv::core::{Mat, Vector};
use opencv::imgproc;
use opencv::prelude::*;

/// Frame rate assumed when the container reports none.
pub const FALLBACK_FPS: f64 = 25.0;

/// Content-based keyframe selection for footage without GPS.
///
/// A frame is kept when its grayscale histogram has drifted far enough from
/// the last *kept* frame and enough frames have passed to cover the target
/// distance at the assumed speed.
#[derive(Debug, Clone, Copy)]
pub struct HistogramSampler {
    pub target_distance_m: f64,
    pub assumed_speed_kph: f64,
    /// Bhattacharyya distance a frame must exceed, in `[0, 1]`.
    pub diff_threshold: f64,
}

impl HistogramSampler {
    pub fn new(target_distance_m: f64, assumed_speed_kph: f64, diff_threshold: f64) -> Self {
        Self {
            target_distance_m,
            assumed_speed_kph,
            diff_threshold,
        }
    }

    /// Minimum number of frames between two keyframes at `fps`, at least 1.
    pub fn min_frame_gap(&self, fps: f64) -> Result<usize> {
        if !(self.assumed_speed_kph > 0.0) {
            return Err(Error::input(format!(
                "Assumed speed must be positive, got {} km/h",
                self.assumed_speed_kph
            )));
        }
        if !(self.target_distance_m >= 0.0) {
            return Err(Error::input(format!(
                "Target distance must not be negative, got {} m",
                self.target_distance_m
            )));
        }

        let speed_mps = self.assumed_speed_kph * 1000.0 / 3600.0;
        let distance_per_frame = speed_mps / fps;
        let gap = (self.target_distance_m / distance_per_frame).ceil();
        Ok((gap as usize).max(1))
    }

    /// Scans `source` once, front to back, calling `on_keyframe` for every
    /// selected frame. The first frame is always selected and seeds the
    /// reference histogram.
    pub fn sample<S, F>(
        &self,
        source: &mut S,
        control: &JobControl,
        mut on_keyframe: F,
    ) -> Result<Vec<usize>>
    where
        S: VideoSource + ?Sized,
        F: FnMut(&Frame) -> Result<()>,
    {
        let first = source
            .read_next()?
            .ok_or_else(|| Error::input("Video yields no frames"))?;

        let mut fps = source.fps();
        if !(fps > 0.0) {
            tracing::warn!(
                "HistogramSampler: invalid fps {}, falling back to {}",
                fps,
                FALLBACK_FPS
            );
            fps = FALLBACK_FPS;
        }
        let min_frame_gap = self.min_frame_gap(fps)?;
        tracing::info!(
            "HistogramSampler: min_frame_gap={} ({} m at {} km/h, {:.2} fps), threshold={}",
            min_frame_gap,
            self.target_distance_m,
            self.assumed_speed_kph,
            fps,
            self.diff_threshold
        );

        let mut reference = gray_histogram(&first.mat)?;
        let mut last_selected = first.index;
        let mut selected = vec![first.index];
        on_keyframe(&first)?;

        while let Some(frame) = source.read_next()? {
            control.check()?;

            let current = gray_histogram(&frame.mat)?;
            let distance = bhattacharyya(&reference, &current)?;

            if distance > self.diff_threshold && frame.index - last_selected >= min_frame_gap {
                on_keyframe(&frame)?;
                selected.push(frame.index);
                reference = current;
                last_selected = frame.index;
            }
        }

        Ok(selected)
    }
}

/// 256-bin intensity histogram of a BGR or single-channel frame.
pub fn gray_histogram(mat: &Mat) -> Result<Mat> {
    let gray = if mat.channels() == 1 {
        mat.clone()
    } else {
        let mut gray = Mat::default();
        imgproc::cvt_color_def(mat, &mut gray, imgproc::COLOR_BGR2GRAY)?;
        gray
    };

    let images = Vector::<Mat>::from_iter([gray]);
    let channels = Vector::<i32>::from_slice(&[0]);
    let hist_size = Vector::<i32>::from_slice(&[256]);
    let ranges = Vector::<f32>::from_slice(&[0.0, 256.0]);
    let mut hist = Mat::default();
    imgproc::calc_hist(
        &images,
        &channels,
        &Mat::default(),
        &mut hist,
        &hist_size,
        &ranges,
        false,
    )?;
    Ok(hist)
}

/// Bhattacharyya distance between two histograms, in `[0, 1]`.
pub fn bhattacharyya(a: &Mat, b: &Mat) -> Result<f64> {
    Ok(imgproc::compare_hist(a, b, imgproc::HISTCMP_BHATTACHARYYA)?)
}
