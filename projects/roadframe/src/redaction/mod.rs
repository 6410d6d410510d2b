// Redaction pipeline: detect privacy-sensitive regions in a folder of frames,
// blur them, and hand off the box lists to review.

pub mod annotate;
pub mod batch;
pub mod blur;
pub mod coords;
pub mod detector;
pub mod sidecar;

use crate::control::JobControl;
use crate::error::{Error, Result};
use crate::run_artifacts::{RedactionSummary, SkippedImage};
use crate::run_context::list_images;
use batch::process_in_windows;
use blur::{blur_regions, BlurConfig};
use coords::{to_normalized, to_pixel, PixelBox};
use detector::{Detection, Detector};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use sidecar::{sidecar_path, write_normalized_boxes, write_pixel_boxes, PIXEL_SIDECAR_DIR};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// What to do when the detector fails on an image.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectorFailure {
    /// No detection can be trusted any more; fail the whole job.
    Abort,
    /// Log the image as skipped and carry on.
    #[default]
    Skip,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RedactionJob {
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub confidence_threshold: f32,
    /// Window size once the folder is larger than `batch_threshold`.
    pub batch_size: usize,
    pub batch_threshold: usize,
    #[serde(default)]
    pub blur: BlurConfig,
    #[serde(default)]
    pub on_detector_error: DetectorFailure,
}

impl RedactionJob {
    pub fn new(input_folder: &Path, output_folder: &Path) -> Self {
        Self {
            input_folder: input_folder.to_path_buf(),
            output_folder: output_folder.to_path_buf(),
            confidence_threshold: 0.05,
            batch_size: 50,
            batch_threshold: 500,
            blur: BlurConfig::default(),
            on_detector_error: DetectorFailure::Skip,
        }
    }

    /// Images per window: the configured batch size for large folders, one
    /// image at a time otherwise.
    pub fn window_size(&self, image_count: usize) -> usize {
        if image_count > self.batch_threshold {
            self.batch_size.max(1)
        } else {
            1
        }
    }
}

struct LoadedImage {
    path: PathBuf,
    file_name: String,
    mat: Mat,
}

/// Redacts every image of `job.input_folder` into `job.output_folder`.
///
/// Each output keeps the input file name. Images without detections are
/// copied byte for byte. The pixel box list of every image is written to
/// `annot_txt/<stem>.txt`, replacing any earlier record. Undecodable images,
/// and images whose stem an earlier image already claimed, are skipped and
/// listed in the summary. Progress is reported as
/// `(images_done, images_total)` after each image.
pub fn redact(
    job: &RedactionJob,
    detector: &mut dyn Detector,
    control: &JobControl,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<RedactionSummary> {
    let images = list_images(&job.input_folder);
    if images.is_empty() {
        return Err(Error::input(format!(
            "No images found in input folder {}",
            job.input_folder.display()
        )));
    }
    if same_folder(&job.input_folder, &job.output_folder) {
        return Err(Error::input("Output folder must differ from input folder"));
    }

    let annot_dir = job.output_folder.join(PIXEL_SIDECAR_DIR);
    fs::create_dir_all(&annot_dir)?;

    let mut summary = RedactionSummary::default();
    let images = drop_sidecar_collisions(images, &mut summary);
    let total = images.len();
    let window = job.window_size(total);
    if window > 1 {
        tracing::info!(
            "Redacting {} images in windows of {} (threshold {})",
            total,
            window,
            job.batch_threshold
        );
    } else {
        tracing::info!("Redacting {} images", total);
    }

    let mut done = 0usize;

    process_in_windows(
        &images,
        window,
        |window_idx, paths| {
            control.check()?;
            let loaded = load_window(paths, &mut summary);
            let detections = detect_window(job, &mut *detector, &loaded, &mut summary)?;

            for (image, found) in loaded.iter().zip(&detections) {
                control.check()?;
                if let Some(found) = found {
                    let boxes = redact_image(job, image, found, &annot_dir)?;
                    summary.processed += 1;
                    summary.boxes += boxes;
                }
                done += 1;
                progress(done, total);
            }
            // Images that failed to decode still count toward progress.
            let undecoded = paths.len() - loaded.len();
            if undecoded > 0 {
                done += undecoded;
                progress(done, total);
            }

            if window > 1 {
                tracing::debug!("Window {} finished ({} images)", window_idx, paths.len());
            }
            Ok((loaded, detections))
        },
        |window_idx, state| {
            drop(state);
            if window > 1 {
                tracing::debug!("Window {} released", window_idx);
            }
        },
    )?;

    tracing::info!(
        "Processed {} images total, {} boxes, {} skipped",
        summary.processed,
        summary.boxes,
        summary.skipped.len()
    );
    Ok(summary)
}

/// Keeps the first image of each stem; `a.jpg` and `a.png` would share one
/// sidecar, so later ones are skipped and listed in the summary.
fn drop_sidecar_collisions(images: Vec<PathBuf>, summary: &mut RedactionSummary) -> Vec<PathBuf> {
    let mut owners: BTreeMap<PathBuf, String> = BTreeMap::new();
    let mut kept = Vec::with_capacity(images.len());
    for path in images {
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let sidecar = sidecar_path(Path::new(""), &file_name);
        match owners.get(&sidecar) {
            Some(owner) => {
                tracing::warn!(
                    "Skipping {}: its box file {} is already written for {}",
                    file_name,
                    sidecar.display(),
                    owner
                );
                summary.skipped.push(SkippedImage {
                    reason: format!(
                        "box file {} already belongs to {}",
                        sidecar.display(),
                        owner
                    ),
                    file_name,
                });
            }
            None => {
                owners.insert(sidecar, file_name);
                kept.push(path);
            }
        }
    }
    kept
}

fn same_folder(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn load_window(paths: &[PathBuf], summary: &mut RedactionSummary) -> Vec<LoadedImage> {
    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match decode_image(path) {
            Ok(mat) => loaded.push(LoadedImage {
                path: path.clone(),
                file_name,
                mat,
            }),
            Err(e) => {
                tracing::warn!("Could not read image {}: {}", path.display(), e);
                summary.skipped.push(SkippedImage {
                    file_name,
                    reason: e.to_string(),
                });
            }
        }
    }
    loaded
}

pub fn decode_image(path: &Path) -> Result<Mat> {
    let path_str = path
        .to_str()
        .ok_or_else(|| Error::decode(path, "non UTF-8 path"))?;
    let mat = imgcodecs::imread(path_str, imgcodecs::IMREAD_COLOR)
        .map_err(|e| Error::decode(path, e))?;
    if mat.empty() {
        return Err(Error::decode(path, "unreadable or unsupported image"));
    }
    Ok(mat)
}

/// Detections per loaded image; `None` marks an image skipped after a
/// detector failure.
fn detect_window(
    job: &RedactionJob,
    detector: &mut dyn Detector,
    loaded: &[LoadedImage],
    summary: &mut RedactionSummary,
) -> Result<Vec<Option<Vec<Detection>>>> {
    if loaded.is_empty() {
        return Ok(Vec::new());
    }

    let mats: Vec<Mat> = loaded.iter().map(|image| image.mat.clone()).collect();
    let batch_err = match detector.detect_batch(&mats) {
        Ok(results) if results.len() == loaded.len() => {
            return Ok(results.into_iter().map(Some).collect())
        }
        Ok(results) => Error::Detector(format!(
            "detector returned {} results for {} images",
            results.len(),
            loaded.len()
        )),
        Err(e) => e,
    };

    if job.on_detector_error == DetectorFailure::Abort {
        return Err(batch_err);
    }

    // Retry one by one so a single bad image does not cost the whole window.
    let mut results = Vec::with_capacity(loaded.len());
    for image in loaded {
        match detector.detect(&image.mat) {
            Ok(found) => results.push(Some(found)),
            Err(e) => {
                tracing::warn!("Detector failed on {}: {}", image.file_name, e);
                summary.skipped.push(SkippedImage {
                    file_name: image.file_name.clone(),
                    reason: e.to_string(),
                });
                results.push(None);
            }
        }
    }
    Ok(results)
}

/// Writes the sidecar and output image for one image. Returns the box count.
fn redact_image(
    job: &RedactionJob,
    image: &LoadedImage,
    found: &[Detection],
    annot_dir: &Path,
) -> Result<usize> {
    let (width, height) = (image.mat.cols() as u32, image.mat.rows() as u32);
    let boxes: Vec<PixelBox> = found
        .iter()
        .filter(|d| d.confidence >= job.confidence_threshold)
        .map(|d| to_pixel(&d.bbox, width, height))
        .collect();

    write_pixel_boxes(&sidecar_path(annot_dir, &image.file_name), &boxes)?;

    let output_path = job.output_folder.join(&image.file_name);
    if boxes.is_empty() {
        tracing::debug!("No detections for {}, copying original", image.file_name);
        fs::copy(&image.path, &output_path)?;
    } else {
        let mut redacted = image.mat.try_clone()?;
        let blurred = blur_regions(&mut redacted, &boxes, &job.blur)?;
        tracing::debug!(
            "Blurred {} of {} regions in {}",
            blurred,
            boxes.len(),
            image.file_name
        );
        write_image(&output_path, &redacted)?;
    }

    Ok(boxes.len())
}

fn write_image(path: &Path, mat: &Mat) -> Result<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| Error::input(format!("Non UTF-8 output path: {}", path.display())))?;
    if !imgcodecs::imwrite(path_str, mat, &Vector::new())? {
        return Err(Error::Io(std::io::Error::other(format!(
            "failed to write {}",
            path_str
        ))));
    }
    Ok(())
}

/// Re-renders `output_image` from the untouched `source_image` with an edited
/// box list and replaces the pixel sidecar at `sidecar`.
///
/// With `normalized_sidecar`, the same boxes are also written in the
/// normalized layout so the edit can feed back into detector training.
pub fn reblur(
    source_image: &Path,
    boxes: &[PixelBox],
    output_image: &Path,
    sidecar: &Path,
    normalized_sidecar: Option<&Path>,
    blur: &BlurConfig,
) -> Result<usize> {
    let mut image = decode_image(source_image)?;
    for path in [Some(sidecar), Some(output_image), normalized_sidecar]
        .into_iter()
        .flatten()
    {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
    }

    write_pixel_boxes(sidecar, boxes)?;
    if let Some(path) = normalized_sidecar {
        let (width, height) = (image.cols() as u32, image.rows() as u32);
        let normalized: Vec<_> = boxes
            .iter()
            .map(|b| to_normalized(b, width, height, None))
            .collect();
        write_normalized_boxes(path, &normalized)?;
    }
    let blurred = blur_regions(&mut image, boxes, blur)?;
    write_image(output_image, &image)?;
    Ok(blurred)
}

#[cfg(test)]
mod tests {
    use super::detector::fake::{detection, FixedDetector};
    use super::sidecar::read_pixel_boxes;
    use super::*;
    use opencv::core::{Scalar, Vec3b, CV_8UC3};

    fn write_test_image(path: &Path, seed: u8) {
        let mut img =
            Mat::new_rows_cols_with_default(48, 64, CV_8UC3, Scalar::all(0.0)).unwrap();
        for y in 0..48 {
            for x in 0..64 {
                let v = if (x / 3 + y / 3) % 2 == 0 { 255 } else { seed };
                *img.at_2d_mut::<Vec3b>(y, x).unwrap() = Vec3b::all(v);
            }
        }
        imgcodecs::imwrite(path.to_str().unwrap(), &img, &Vector::new()).unwrap();
    }

    fn folder_with_images(n: usize) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..n {
            write_test_image(&dir.path().join(format!("frame_{:04}.png", i)), i as u8);
        }
        dir
    }

    /// File name -> bytes for every regular file in `dir` (non-recursive).
    fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| {
                (
                    e.file_name().to_string_lossy().to_string(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    fn run(job: &RedactionJob, detector: &mut dyn Detector) -> Result<RedactionSummary> {
        redact(job, detector, &JobControl::default(), &mut |_, _| {})
    }

    #[test]
    fn test_one_output_per_input_with_same_name() {
        let input = folder_with_images(4);
        fs::write(input.path().join("readme.txt"), b"ignore me").unwrap();
        let output = tempfile::tempdir().unwrap();
        let job = RedactionJob::new(input.path(), output.path());
        let mut detector = FixedDetector::new(vec![detection(0.5, 0.5, 0.25, 0.25, 0.9)]);

        let summary = run(&job, &mut detector).unwrap();
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.boxes, 4);

        let inputs: Vec<String> = list_images(input.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        let outputs: Vec<String> = snapshot(output.path()).into_keys().collect();
        assert_eq!(inputs, outputs);

        let boxes = read_pixel_boxes(&output.path().join("annot_txt/frame_0000.txt")).unwrap();
        assert_eq!(
            boxes,
            vec![PixelBox {
                x_min: 24.0,
                y_min: 18.0,
                x_max: 40.0,
                y_max: 30.0
            }]
        );
    }

    #[test]
    fn test_images_sharing_a_stem_do_not_share_a_box_file() {
        let input = folder_with_images(1);
        write_test_image(&input.path().join("a.jpg"), 40);
        write_test_image(&input.path().join("a.png"), 80);
        let output = tempfile::tempdir().unwrap();
        let job = RedactionJob::new(input.path(), output.path());
        let mut detector = FixedDetector::new(vec![detection(0.5, 0.5, 0.25, 0.25, 0.9)]);

        let mut calls = Vec::new();
        let summary = redact(&job, &mut detector, &JobControl::default(), &mut |d, t| {
            calls.push((d, t))
        })
        .unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].file_name, "a.png");
        assert!(summary.skipped[0].reason.contains("a.jpg"));
        assert_eq!(calls.last(), Some(&(2, 2)));

        let outputs: Vec<String> = snapshot(output.path()).into_keys().collect();
        assert_eq!(outputs, vec!["a.jpg", "frame_0000.png"]);
        assert_eq!(
            read_pixel_boxes(&output.path().join("annot_txt/a.txt"))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_no_detections_copies_bytes() {
        let input = folder_with_images(3);
        let output = tempfile::tempdir().unwrap();
        let job = RedactionJob::new(input.path(), output.path());
        let mut detector = FixedDetector::new(vec![]);

        let summary = run(&job, &mut detector).unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.boxes, 0);
        assert_eq!(snapshot(input.path()), snapshot(output.path()));
        let sidecar = output.path().join("annot_txt/frame_0001.txt");
        assert_eq!(fs::read_to_string(sidecar).unwrap(), "");
    }

    #[test]
    fn test_confidence_threshold_filters_boxes() {
        let input = folder_with_images(1);
        let output = tempfile::tempdir().unwrap();
        let mut job = RedactionJob::new(input.path(), output.path());
        job.confidence_threshold = 0.5;
        let mut detector = FixedDetector::new(vec![
            detection(0.25, 0.25, 0.1, 0.1, 0.49),
            detection(0.75, 0.75, 0.1, 0.1, 0.5),
        ]);

        let summary = run(&job, &mut detector).unwrap();
        assert_eq!(summary.boxes, 1);
        let boxes = read_pixel_boxes(&output.path().join("annot_txt/frame_0000.txt")).unwrap();
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].x_min > 32.0);
    }

    #[test]
    fn test_redacted_image_keeps_dimensions() {
        let input = folder_with_images(1);
        let output = tempfile::tempdir().unwrap();
        let job = RedactionJob::new(input.path(), output.path());
        let mut detector = FixedDetector::new(vec![detection(0.5, 0.5, 0.5, 0.5, 0.9)]);
        run(&job, &mut detector).unwrap();

        let src = decode_image(&input.path().join("frame_0000.png")).unwrap();
        let out = decode_image(&output.path().join("frame_0000.png")).unwrap();
        assert_eq!((src.cols(), src.rows()), (out.cols(), out.rows()));
        assert_ne!(
            fs::read(input.path().join("frame_0000.png")).unwrap(),
            fs::read(output.path().join("frame_0000.png")).unwrap()
        );
    }

    #[test]
    fn test_batched_matches_unbatched() {
        let input = folder_with_images(7);
        let dets = vec![
            detection(0.3, 0.3, 0.2, 0.2, 0.8),
            detection(0.7, 0.6, 0.1, 0.3, 0.6),
        ];

        let plain_out = tempfile::tempdir().unwrap();
        let plain = RedactionJob::new(input.path(), plain_out.path());
        let mut plain_detector = FixedDetector::new(dets.clone());
        let plain_summary = run(&plain, &mut plain_detector).unwrap();
        assert_eq!(plain_detector.batch_calls, 7);

        let batched_out = tempfile::tempdir().unwrap();
        let mut batched = RedactionJob::new(input.path(), batched_out.path());
        batched.batch_threshold = 2;
        batched.batch_size = 3;
        let mut batched_detector = FixedDetector::new(dets);
        let batched_summary = run(&batched, &mut batched_detector).unwrap();
        assert_eq!(batched_detector.batch_calls, 3);

        assert_eq!(plain_summary.processed, batched_summary.processed);
        assert_eq!(plain_summary.boxes, batched_summary.boxes);
        assert_eq!(snapshot(plain_out.path()), snapshot(batched_out.path()));
        assert_eq!(
            snapshot(&plain_out.path().join(PIXEL_SIDECAR_DIR)),
            snapshot(&batched_out.path().join(PIXEL_SIDECAR_DIR))
        );
    }

    #[test]
    fn test_undecodable_image_is_skipped() {
        let input = folder_with_images(2);
        fs::write(input.path().join("broken.jpg"), b"not an image").unwrap();
        let output = tempfile::tempdir().unwrap();
        let job = RedactionJob::new(input.path(), output.path());
        let mut detector = FixedDetector::new(vec![]);

        let mut calls = Vec::new();
        let summary = redact(
            &job,
            &mut detector,
            &JobControl::default(),
            &mut |done, total| calls.push((done, total)),
        )
        .unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].file_name, "broken.jpg");
        assert!(!output.path().join("broken.jpg").exists());
        assert_eq!(calls.last(), Some(&(3, 3)));
    }

    #[test]
    fn test_detector_failure_can_abort_job() {
        let input = folder_with_images(3);
        let output = tempfile::tempdir().unwrap();
        let mut job = RedactionJob::new(input.path(), output.path());
        job.on_detector_error = DetectorFailure::Abort;
        let mut detector = FixedDetector::new(vec![]);
        detector.failures.extend([false, true]);

        let err = run(&job, &mut detector).unwrap_err();
        assert!(matches!(err, Error::Detector(_)));
    }

    #[test]
    fn test_detector_failure_skips_image_by_default() {
        let input = folder_with_images(3);
        let output = tempfile::tempdir().unwrap();
        let job = RedactionJob::new(input.path(), output.path());
        let mut detector = FixedDetector::new(vec![]);
        // Second image: the batch call fails, then the single retry fails too.
        detector.failures.extend([false, true, true]);

        let summary = run(&job, &mut detector).unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].file_name, "frame_0001.png");
        assert!(!output.path().join("frame_0001.png").exists());
    }

    #[test]
    fn test_empty_folder_is_input_error() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let job = RedactionJob::new(input.path(), output.path());
        let err = run(&job, &mut FixedDetector::new(vec![])).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn test_same_input_and_output_is_rejected() {
        let input = folder_with_images(1);
        let job = RedactionJob::new(input.path(), input.path());
        let err = run(&job, &mut FixedDetector::new(vec![])).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn test_reblur_replaces_sidecar() {
        let input = folder_with_images(1);
        let output = tempfile::tempdir().unwrap();
        let source = input.path().join("frame_0000.png");
        let out_image = output.path().join("frame_0000.png");
        let sidecar = output.path().join("annot_txt/frame_0000.txt");

        let first = [PixelBox {
            x_min: 0.0,
            y_min: 0.0,
            x_max: 20.0,
            y_max: 20.0,
        }];
        reblur(&source, &first, &out_image, &sidecar, None, &BlurConfig::default()).unwrap();
        assert_eq!(read_pixel_boxes(&sidecar).unwrap(), first);

        let edited = [PixelBox {
            x_min: 30.0,
            y_min: 10.0,
            x_max: 60.0,
            y_max: 40.0,
        }];
        let n = reblur(
            &source,
            &edited,
            &out_image,
            &sidecar,
            None,
            &BlurConfig::default(),
        )
        .unwrap();
        assert_eq!(n, 1);
        assert_eq!(read_pixel_boxes(&sidecar).unwrap(), edited);

        // The first region is untouched again since we always start from the source.
        let src = decode_image(&source).unwrap();
        let out = decode_image(&out_image).unwrap();
        assert_eq!(
            src.at_2d::<Vec3b>(5, 5).unwrap(),
            out.at_2d::<Vec3b>(5, 5).unwrap()
        );
    }

    #[test]
    fn test_reblur_writes_normalized_sidecar() {
        use super::sidecar::read_normalized_boxes;

        let input = folder_with_images(1);
        let output = tempfile::tempdir().unwrap();
        let source = input.path().join("frame_0000.png");
        let normalized = output.path().join("labels/frame_0000.txt");
        let boxes = [PixelBox {
            x_min: 16.0,
            y_min: 12.0,
            x_max: 48.0,
            y_max: 24.0,
        }];
        reblur(
            &source,
            &boxes,
            &output.path().join("frame_0000.png"),
            &output.path().join("annot_txt/frame_0000.txt"),
            Some(&normalized),
            &BlurConfig::default(),
        )
        .unwrap();

        // 64 x 48 source image.
        let written = read_normalized_boxes(&normalized).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].class_id, Some(0));
        assert_eq!(
            (written[0].cx, written[0].cy, written[0].w, written[0].h),
            (0.5, 0.375, 0.5, 0.25)
        );
        assert_eq!(to_pixel(&written[0], 64, 48), boxes[0]);
    }

    #[test]
    fn test_cancel_stops_before_writing() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let input = folder_with_images(2);
        let output = tempfile::tempdir().unwrap();
        let job = RedactionJob::new(input.path(), output.path());
        let control = JobControl::new(Arc::new(AtomicBool::new(false)));
        let err = redact(&job, &mut FixedDetector::new(vec![]), &control, &mut |_, _| {})
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(snapshot(output.path()).is_empty());
    }
}
