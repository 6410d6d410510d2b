// Frame extraction: runs a sampler against a video and writes the keyframes

use crate::control::JobControl;
use crate::error::{Error, Result};
use crate::run_artifacts::{write_frame_manifest, FrameRecord};
use crate::track::distance::{plan_frames, DistanceSampler};
use crate::track::GeoTrack;
use crate::video::histogram::HistogramSampler;
use crate::video::opencv_source::OpencvSource;
use crate::video::{Frame, VideoSource};
use opencv::core::Vector;
use opencv::imgcodecs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sampling strategy and its parameters, as accepted from callers.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Method {
    Gps {
        track_path: PathBuf,
        interval_m: f64,
    },
    Histogram {
        target_distance_m: f64,
        assumed_speed_kph: f64,
        diff_threshold: f64,
    },
}

/// A resolved strategy ready to run against a source.
pub enum Strategy {
    Distance {
        track: GeoTrack,
        sampler: DistanceSampler,
    },
    Histogram(HistogramSampler),
}

impl Strategy {
    pub fn from_method(method: &Method) -> Result<Self> {
        match method {
            Method::Gps {
                track_path,
                interval_m,
            } => Ok(Strategy::Distance {
                track: GeoTrack::from_gpx_file(track_path)?,
                sampler: DistanceSampler::new(*interval_m),
            }),
            Method::Histogram {
                target_distance_m,
                assumed_speed_kph,
                diff_threshold,
            } => Ok(Strategy::Histogram(HistogramSampler::new(
                *target_distance_m,
                *assumed_speed_kph,
                *diff_threshold,
            ))),
        }
    }
}

/// Where and how keyframes are written: `{video_stem}_{sequence:04}.{extension}`.
#[derive(Debug, Clone)]
pub struct FrameSink {
    pub output_dir: PathBuf,
    pub video_stem: String,
    pub extension: String,
}

impl FrameSink {
    pub fn for_video(video_path: &Path, output_dir: &Path, extension: &str) -> Result<Self> {
        let video_stem = video_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::input(format!("Invalid video name: {}", video_path.display())))?
            .to_string();
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            video_stem,
            extension: extension.trim_start_matches('.').to_string(),
        })
    }

    pub fn file_name(&self, sequence: usize) -> String {
        format!("{}_{:04}.{}", self.video_stem, sequence, self.extension)
    }

    fn write(&self, sequence: usize, frame: &Frame) -> Result<PathBuf> {
        let path = self.output_dir.join(self.file_name(sequence));
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::input(format!("Non UTF-8 output path: {}", path.display())))?;
        if !imgcodecs::imwrite(path_str, &frame.mat, &Vector::new())? {
            return Err(Error::Io(std::io::Error::other(format!(
                "failed to write frame {} to {}",
                frame.index, path_str
            ))));
        }
        Ok(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Written frame files, in output order.
    pub frames: Vec<PathBuf>,
    pub records: Vec<FrameRecord>,
    /// Selected frames that could not be decoded.
    pub skipped: Vec<usize>,
}

/// Runs `strategy` against `source`, writing every selected frame through
/// `sink` and reporting `(frames_done, frames_total)` after each write.
///
/// Fails with `Error::Input` when no frame was written.
pub fn extract<S>(
    source: &mut S,
    strategy: &Strategy,
    sink: &FrameSink,
    control: &JobControl,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<ExtractionReport>
where
    S: VideoSource + ?Sized,
{
    std::fs::create_dir_all(&sink.output_dir)?;

    let report = match strategy {
        Strategy::Distance { track, sampler } => {
            extract_by_distance(source, track, sampler, sink, control, progress)?
        }
        Strategy::Histogram(sampler) => {
            extract_by_histogram(source, sampler, sink, control, progress)?
        }
    };

    if report.frames.is_empty() {
        return Err(Error::input(format!(
            "No frames extracted for {}",
            sink.video_stem
        )));
    }

    write_frame_manifest(&sink.output_dir, &report.records)?;
    tracing::info!(
        "Extracted {} frames for {} ({} skipped)",
        report.frames.len(),
        sink.video_stem,
        report.skipped.len()
    );
    Ok(report)
}

fn extract_by_distance<S>(
    source: &mut S,
    track: &GeoTrack,
    sampler: &DistanceSampler,
    sink: &FrameSink,
    control: &JobControl,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<ExtractionReport>
where
    S: VideoSource + ?Sized,
{
    let fps = source.fps();
    if !(fps > 0.0) {
        return Err(Error::input("Could not determine video FPS"));
    }

    let queries = sampler.sample(track)?;
    let planned = plan_frames(&queries, fps);
    let total = planned.len();
    tracing::info!(
        "GPS sampling: {} queries every {} m map to {} distinct frames",
        queries.len(),
        sampler.interval_m,
        total
    );

    let mut report = ExtractionReport::default();
    for (i, plan) in planned.iter().enumerate() {
        control.check()?;

        let frame = match source.seek_and_read(plan.frame_index) {
            Ok(Some(frame)) => frame,
            Ok(None) if plan.frame_index < source.frame_count() => {
                tracing::warn!("Frame {} could not be decoded, skipping", plan.frame_index);
                report.skipped.push(plan.frame_index);
                continue;
            }
            Ok(None) => {
                // Indices only grow, so everything after this is past the end too.
                let rest: Vec<usize> = planned[i..].iter().map(|p| p.frame_index).collect();
                tracing::warn!(
                    "Video ended before frame {}; {} planned frames not written",
                    plan.frame_index,
                    rest.len()
                );
                report.skipped.extend(rest);
                break;
            }
            Err(e) => {
                tracing::warn!("Failed to decode frame {}: {}", plan.frame_index, e);
                report.skipped.push(plan.frame_index);
                continue;
            }
        };

        let sequence = report.frames.len();
        let path = sink.write(sequence, &frame)?;
        report.records.push(FrameRecord {
            sequence,
            frame_index: frame.index,
            video_time_s: frame.index as f64 / fps,
            distance_m: Some(plan.query.distance_m),
            file_name: sink.file_name(sequence),
        });
        report.frames.push(path);
        progress(report.frames.len(), total);
    }

    Ok(report)
}

fn extract_by_histogram<S>(
    source: &mut S,
    sampler: &HistogramSampler,
    sink: &FrameSink,
    control: &JobControl,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<ExtractionReport>
where
    S: VideoSource + ?Sized,
{
    let total = source.frame_count();
    let fps = source.fps();
    let fps = if fps > 0.0 {
        fps
    } else {
        crate::video::histogram::FALLBACK_FPS
    };

    let mut report = ExtractionReport::default();
    sampler.sample(source, control, |frame| {
        let sequence = report.frames.len();
        let path = sink.write(sequence, frame)?;
        report.records.push(FrameRecord {
            sequence,
            frame_index: frame.index,
            video_time_s: frame.index as f64 / fps,
            distance_m: None,
            file_name: sink.file_name(sequence),
        });
        report.frames.push(path);
        // Scan position stands in for progress; the keyframe count is unknown upfront.
        let done = frame.index + 1;
        progress(done, total.max(done));
        Ok(())
    })?;

    Ok(report)
}

/// Opens `video_path`, resolves `method` and extracts into `output_dir`.
///
/// The decoder is released when this returns, on success or failure.
pub fn extract_video(
    video_path: &Path,
    method: &Method,
    output_dir: &Path,
    extension: &str,
    control: &JobControl,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<ExtractionReport> {
    let strategy = Strategy::from_method(method)?;
    let sink = FrameSink::for_video(video_path, output_dir, extension)?;
    let mut source = OpencvSource::open(video_path)?;
    extract(&mut source, &strategy, &sink, control, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_artifacts::read_frame_manifest;
    use crate::track::Waypoint;
    use crate::video::synthetic::SyntheticVideo;
    use chrono::{Duration, TimeZone, Utc};

    fn track(seconds: i64) -> GeoTrack {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        GeoTrack::new(vec![
            Waypoint::new(0.0, 0.0, t0),
            Waypoint::new(0.0, 0.001, t0 + Duration::seconds(seconds / 2)),
            Waypoint::new(0.0, 0.002, t0 + Duration::seconds(seconds)),
        ])
    }

    fn sink(dir: &Path) -> FrameSink {
        FrameSink::for_video(Path::new("/videos/drive.mp4"), dir, "png").unwrap()
    }

    #[test]
    fn test_file_naming() {
        let sink = sink(Path::new("/out"));
        assert_eq!(sink.file_name(7), "drive_0007.png");
        let jpg = FrameSink::for_video(Path::new("a/b/run.MOV"), Path::new("/o"), ".jpg").unwrap();
        assert_eq!(jpg.file_name(12), "run_0012.jpg");
    }

    #[test]
    fn test_gps_extraction_writes_planned_frames() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path());
        // 20 s track, 10 fps video of 200 frames.
        let mut video = SyntheticVideo::new(10.0, (0..200).map(|i| i as u8).collect());
        let strategy = Strategy::Distance {
            track: track(20),
            sampler: DistanceSampler::new(50.0),
        };

        let mut calls = Vec::new();
        let report = extract(
            &mut video,
            &strategy,
            &sink,
            &JobControl::default(),
            &mut |done, total| calls.push((done, total)),
        )
        .unwrap();

        assert_eq!(report.frames.len(), 5);
        assert!(report.skipped.is_empty());
        assert_eq!(calls, (1..=5).map(|d| (d, 5)).collect::<Vec<_>>());

        let indices: Vec<usize> = report.records.iter().map(|r| r.frame_index).collect();
        assert_eq!(indices[0], 0);
        for w in indices.windows(2) {
            assert!(w[1] > w[0]);
        }
        assert_eq!(video.seeks, indices);

        for (i, path) in report.frames.iter().enumerate() {
            assert!(path.exists());
            assert_eq!(path.file_name().unwrap().to_str().unwrap(), sink.file_name(i));
        }
        assert_eq!(read_frame_manifest(dir.path()).unwrap(), report.records);
    }

    #[test]
    fn test_gps_extraction_records_frames_past_end() {
        let dir = tempfile::tempdir().unwrap();
        // Track lasts 20 s but the video only holds 5 s.
        let mut video = SyntheticVideo::new(10.0, vec![10; 50]);
        let strategy = Strategy::Distance {
            track: track(20),
            sampler: DistanceSampler::new(50.0),
        };
        let report = extract(
            &mut video,
            &strategy,
            &sink(dir.path()),
            &JobControl::default(),
            &mut |_, _| {},
        )
        .unwrap();

        assert_eq!(report.frames.len() + report.skipped.len(), 5);
        assert!(!report.skipped.is_empty());
        assert!(report.skipped.iter().all(|&i| i >= 50));
    }

    #[test]
    fn test_gps_extraction_skips_only_undecodable_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut video = SyntheticVideo::new(10.0, (0..200).map(|i| i as u8).collect());
        let strategy = Strategy::Distance {
            track: track(20),
            sampler: DistanceSampler::new(50.0),
        };
        let planned = plan_frames(&DistanceSampler::new(50.0).sample(&track(20)).unwrap(), 10.0);
        let broken = planned[1].frame_index;
        video.missing.push(broken);

        let report = extract(
            &mut video,
            &strategy,
            &sink(dir.path()),
            &JobControl::default(),
            &mut |_, _| {},
        )
        .unwrap();

        assert_eq!(report.skipped, vec![broken]);
        assert_eq!(report.frames.len(), planned.len() - 1);
        let written: Vec<usize> = report.records.iter().map(|r| r.frame_index).collect();
        let expected: Vec<usize> = planned
            .iter()
            .map(|p| p.frame_index)
            .filter(|&i| i != broken)
            .collect();
        assert_eq!(written, expected);
        assert!(dir.path().join("drive_0003.png").exists());
    }

    #[test]
    fn test_gps_extraction_requires_fps() {
        let dir = tempfile::tempdir().unwrap();
        let mut video = SyntheticVideo::new(0.0, vec![10; 50]);
        let strategy = Strategy::Distance {
            track: track(20),
            sampler: DistanceSampler::new(50.0),
        };
        let err = extract(
            &mut video,
            &strategy,
            &sink(dir.path()),
            &JobControl::default(),
            &mut |_, _| {},
        )
        .unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn test_histogram_extraction_numbers_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path());
        let mut levels = vec![30u8; 20];
        levels.extend(vec![200u8; 20]);
        let mut video = SyntheticVideo::new(10.0, levels);
        let strategy = Strategy::Histogram(HistogramSampler::new(1.0, 36.0, 0.5));

        let mut calls = Vec::new();
        let report = extract(
            &mut video,
            &strategy,
            &sink,
            &JobControl::default(),
            &mut |done, total| calls.push((done, total)),
        )
        .unwrap();

        let indices: Vec<usize> = report.records.iter().map(|r| r.frame_index).collect();
        assert_eq!(indices, vec![0, 20]);
        assert_eq!(calls, vec![(1, 40), (21, 40)]);
        assert!(dir.path().join("drive_0000.png").exists());
        assert!(dir.path().join("drive_0001.png").exists());
        assert!(report.records.iter().all(|r| r.distance_m.is_none()));
    }

    #[test]
    fn test_cancelled_extraction_stops() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let mut video = SyntheticVideo::new(10.0, vec![10; 200]);
        let strategy = Strategy::Distance {
            track: track(20),
            sampler: DistanceSampler::new(50.0),
        };
        let control = JobControl::new(Arc::new(AtomicBool::new(false)));
        let err = extract(&mut video, &strategy, &sink(dir.path()), &control, &mut |_, _| {})
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(video.seeks.is_empty());
    }
}
