// CLI entry points: resolve arguments, drive the core jobs and render progress.

use crate::cli::{
    AnnotateArgs, BlurArgs, ExtractGpsArgs, ExtractHistogramArgs, RedactArgs, ReblurArgs,
    VideoInput,
};
use crate::control::JobControl;
use crate::extraction::{extract_video, ExtractionReport, Method};
use crate::redaction::annotate::annotate;
use crate::redaction::blur::BlurConfig;
use crate::redaction::detector::RtdetrDetector;
use crate::redaction::sidecar::{read_pixel_boxes, sidecar_path, PIXEL_SIDECAR_DIR};
use crate::redaction::{reblur, redact, DetectorFailure, RedactionJob};
use crate::run_context::{resolve_track, resolve_videos, video_output_dir};
use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

fn bar_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({eta})")?
        .progress_chars("#>-"))
}

fn new_bar(len: u64, msg: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(bar_style()?);
    pb.set_message(msg);
    Ok(pb)
}

impl From<&BlurArgs> for BlurConfig {
    fn from(args: &BlurArgs) -> Self {
        BlurConfig::new(args.blur_kernel, args.blur_sigma)
    }
}

/// Receives progress of a multi-video extraction.
trait BatchProgress {
    fn video_started(&mut self, name: &str) -> Result<()>;
    /// `(done, total)` of the current video and of the whole batch so far.
    fn advanced(&mut self, video: (u64, u64), overall: (u64, u64));
    /// `frames` is `None` when the video failed.
    fn video_finished(&mut self, name: &str, frames: Option<usize>);
}

struct Bars {
    multi: MultiProgress,
    overall: ProgressBar,
    current: Option<ProgressBar>,
}

impl Bars {
    fn new() -> Result<Self> {
        let multi = MultiProgress::new();
        let overall = multi.add(new_bar(0, "all videos".to_string())?);
        Ok(Self {
            multi,
            overall,
            current: None,
        })
    }
}

impl BatchProgress for Bars {
    fn video_started(&mut self, name: &str) -> Result<()> {
        self.current = Some(self.multi.add(new_bar(0, name.to_string())?));
        Ok(())
    }

    fn advanced(&mut self, video: (u64, u64), overall: (u64, u64)) {
        if let Some(pb) = &self.current {
            pb.set_length(video.1);
            pb.set_position(video.0);
        }
        self.overall.set_length(overall.1);
        self.overall.set_position(overall.0);
    }

    fn video_finished(&mut self, name: &str, frames: Option<usize>) {
        if let Some(pb) = self.current.take() {
            match frames {
                Some(n) => pb.finish_with_message(format!("{}: {} frames", name, n)),
                None => pb.abandon_with_message(format!("{}: failed", name)),
            }
        }
    }
}

/// Runs `extract` once per video, each into `<output_root>/<video stem>/`.
///
/// `method_for` returns `None` for videos that should be skipped. Overall
/// progress is weighted by each video's own frame total. Fails only when no
/// video was attempted or every attempted video failed.
fn extract_each<M, E>(
    videos: &[PathBuf],
    output_root: &Path,
    mut method_for: M,
    mut extract: E,
    progress: &mut dyn BatchProgress,
) -> Result<()>
where
    M: FnMut(&Path) -> Option<Method>,
    E: FnMut(
        &Path,
        &Method,
        &Path,
        &mut dyn FnMut(usize, usize),
    ) -> crate::error::Result<ExtractionReport>,
{
    let (mut finished_total, mut finished_done) = (0u64, 0u64);
    let (mut attempted, mut failures) = (0, 0);

    for video in videos {
        let Some(method) = method_for(video) else {
            continue;
        };
        let name = video
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let output_dir = video_output_dir(output_root, video);
        attempted += 1;
        progress.video_started(&name)?;

        let mut last = (0u64, 0u64);
        let result = extract(video, &method, &output_dir, &mut |done, total| {
            last = (done as u64, total as u64);
            progress.advanced(last, (finished_done + last.0, finished_total + last.1));
        });
        finished_total += last.1;
        finished_done += last.0;

        match result {
            Ok(report) => {
                progress.video_finished(&name, Some(report.frames.len()));
                if !report.skipped.is_empty() {
                    tracing::warn!(
                        "{}: {} selected frames could not be decoded",
                        name,
                        report.skipped.len()
                    );
                }
            }
            Err(e) => {
                progress.video_finished(&name, None);
                tracing::error!("Extraction failed for {}: {}", video.display(), e);
                failures += 1;
            }
        }
    }

    if attempted == 0 {
        anyhow::bail!("No video could be matched with its inputs");
    }
    if failures == attempted {
        anyhow::bail!("Extraction failed for every video");
    }
    Ok(())
}

fn extract_all<F>(input: &VideoInput, method_for: F) -> Result<()>
where
    F: FnMut(&Path) -> Option<Method>,
{
    let videos = resolve_videos(&input.video);
    if videos.is_empty() {
        anyhow::bail!("No videos found in {}", input.video.display());
    }

    let mut bars = Bars::new()?;
    let result = extract_each(
        &videos,
        &input.output,
        method_for,
        |video, method, output_dir, progress| {
            extract_video(
                video,
                method,
                output_dir,
                &input.extension,
                &JobControl::default(),
                progress,
            )
        },
        &mut bars,
    );
    bars.overall.finish_with_message("all videos");
    result
}

pub fn run_extract_gps(args: ExtractGpsArgs) -> Result<()> {
    let interval_m = args.interval;
    let gpx = args.gpx.clone();
    extract_all(&args.input, |video| match resolve_track(video, &gpx) {
        Some(track_path) => Some(Method::Gps {
            track_path,
            interval_m,
        }),
        None => {
            tracing::warn!("No GPX track for {}, skipping", video.display());
            None
        }
    })
}

pub fn run_extract_histogram(args: ExtractHistogramArgs) -> Result<()> {
    let method = Method::Histogram {
        target_distance_m: args.target_distance,
        assumed_speed_kph: args.speed_kph,
        diff_threshold: args.threshold,
    };
    extract_all(&args.input, |_| Some(method.clone()))
}

pub fn run_redact(args: RedactArgs) -> Result<()> {
    let mut detector = RtdetrDetector::new(&args.detector.model)
        .with_context(|| format!("Failed to load model {}", args.detector.model))?;

    let mut job = RedactionJob::new(&args.input, &args.output);
    job.confidence_threshold = args.detector.confidence;
    job.batch_size = args.batch_size;
    job.batch_threshold = args.batch_threshold;
    job.blur = BlurConfig::from(&args.blur);
    if args.abort_on_detector_error {
        job.on_detector_error = DetectorFailure::Abort;
    }

    let pb = new_bar(0, "redacting".to_string())?;
    let summary = redact(&job, &mut detector, &JobControl::default(), &mut |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })?;
    pb.finish_with_message(format!("{} boxes", summary.boxes));

    for skipped in &summary.skipped {
        tracing::warn!("Skipped {}: {}", skipped.file_name, skipped.reason);
    }
    tracing::info!(
        "Redacted {} images into {}",
        summary.processed,
        args.output.display()
    );
    Ok(())
}

pub fn run_annotate(args: AnnotateArgs) -> Result<()> {
    let mut detector = RtdetrDetector::new(&args.detector.model)
        .with_context(|| format!("Failed to load model {}", args.detector.model))?;

    let pb = new_bar(0, "annotating".to_string())?;
    let summary = annotate(
        &args.input,
        &args.output,
        &mut detector,
        args.detector.confidence,
        &JobControl::default(),
        &mut |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        },
    )?;
    pb.finish_with_message(format!("{} annotated", summary.annotated));
    Ok(())
}

pub fn run_reblur(args: ReblurArgs) -> Result<()> {
    let boxes = read_pixel_boxes(&args.boxes)
        .with_context(|| format!("Failed to read boxes from {}", args.boxes.display()))?;

    let sidecar = match &args.sidecar {
        Some(path) => path.clone(),
        None => {
            let dir = args
                .output
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(PIXEL_SIDECAR_DIR);
            let name = args
                .output
                .file_name()
                .and_then(|s| s.to_str())
                .context("Output path has no file name")?;
            sidecar_path(&dir, name)
        }
    };

    let blurred = reblur(
        &args.source,
        &boxes,
        &args.output,
        &sidecar,
        args.normalized_sidecar.as_deref(),
        &BlurConfig::from(&args.blur),
    )?;
    tracing::info!(
        "Re-blurred {} regions into {} (boxes in {})",
        blurred,
        args.output.display(),
        sidecar.display()
    );
    Ok(())
}
