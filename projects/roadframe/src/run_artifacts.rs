// Run artifact definitions
//
// Records persisted next to the extracted frames and anonymized images so
// downstream tooling can pick them up without re-running a job.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const FRAME_MANIFEST: &str = "frames.csv";

/// One row of `frames.csv`, written per extracted frame in output order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub sequence: usize,
    pub frame_index: usize,
    /// Position in the video, `frame_index / fps`.
    pub video_time_s: f64,
    /// Path distance of the query that picked this frame (GPS sampling only).
    pub distance_m: Option<f64>,
    pub file_name: String,
}

pub fn write_frame_manifest(output_dir: &Path, records: &[FrameRecord]) -> Result<PathBuf> {
    let path = output_dir.join(FRAME_MANIFEST);
    let mut writer = csv::Writer::from_path(&path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(path)
}

#[cfg(test)]
pub fn read_frame_manifest(output_dir: &Path) -> Result<Vec<FrameRecord>> {
    let mut reader = csv::Reader::from_path(output_dir.join(FRAME_MANIFEST))?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Summary of a redaction run, returned to the caller and published on the job.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RedactionSummary {
    pub processed: usize,
    pub boxes: usize,
    pub skipped: Vec<SkippedImage>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SkippedImage {
    pub file_name: String,
    pub reason: String,
}
