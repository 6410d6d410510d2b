use super::decode_image;
use super::detector::Detector;
use super::sidecar::{sidecar_path, write_normalized_boxes};
use crate::control::JobControl;
use crate::error::{Error, Result};
use crate::run_context::list_images;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSummary {
    pub images: usize,
    pub annotated: usize,
    pub boxes: usize,
}

/// Pre-annotates a folder: writes `class_id cx cy w h` sidecars into
/// `output_folder` for every image with at least one detection at or above
/// `confidence_threshold`. An image without detections has no sidecar, so one
/// left by an earlier run is removed. Any detector failure ends the job.
pub fn annotate(
    input_folder: &Path,
    output_folder: &Path,
    detector: &mut dyn Detector,
    confidence_threshold: f32,
    control: &JobControl,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<AnnotationSummary> {
    let images = list_images(input_folder);
    if images.is_empty() {
        return Err(Error::input(format!(
            "No images found in input folder {}",
            input_folder.display()
        )));
    }
    fs::create_dir_all(output_folder)?;

    let total = images.len();
    let mut summary = AnnotationSummary {
        images: total,
        ..Default::default()
    };

    for (i, path) in images.iter().enumerate() {
        control.check()?;
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        match decode_image(path) {
            Ok(mat) => {
                let boxes: Vec<_> = detector
                    .detect(&mat)?
                    .into_iter()
                    .filter(|d| d.confidence >= confidence_threshold)
                    .map(|d| d.bbox)
                    .collect();
                let sidecar = sidecar_path(output_folder, &file_name);
                if boxes.is_empty() {
                    remove_stale(&sidecar)?;
                } else {
                    write_normalized_boxes(&sidecar, &boxes)?;
                    summary.annotated += 1;
                    summary.boxes += boxes.len();
                }
            }
            Err(e) => tracing::warn!("Skipping {}: {}", file_name, e),
        }
        progress(i + 1, total);
    }

    tracing::info!(
        "Annotated {} of {} images ({} boxes)",
        summary.annotated,
        summary.images,
        summary.boxes
    );
    Ok(summary)
}

/// Drops a box file left by an earlier run.
fn remove_stale(sidecar: &Path) -> Result<()> {
    match fs::remove_file(sidecar) {
        Ok(()) => {
            tracing::debug!("Removed stale {}", sidecar.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
