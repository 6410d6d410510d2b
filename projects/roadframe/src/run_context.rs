use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| extensions.contains(&s.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Files directly inside `dir` with one of `extensions`, sorted by name.
fn list_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| has_extension(e.path(), extensions))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

pub fn list_videos(video_root: &Path) -> Vec<PathBuf> {
    list_files(video_root, VIDEO_EXTENSIONS)
}

pub fn list_images(folder: &Path) -> Vec<PathBuf> {
    list_files(folder, IMAGE_EXTENSIONS)
}

/// Videos named by `input`: the file itself, or every video in the folder.
pub fn resolve_videos(input: &Path) -> Vec<PathBuf> {
    if input.is_dir() {
        list_videos(input)
    } else {
        vec![input.to_path_buf()]
    }
}

/// Track for `video`: `track` itself when it is a file, else `<track>/<video stem>.gpx`.
pub fn resolve_track(video: &Path, track: &Path) -> Option<PathBuf> {
    if !track.is_dir() {
        return track.exists().then(|| track.to_path_buf());
    }
    let stem = video.file_stem()?.to_str()?;
    let candidate = track.join(format!("{}.gpx", stem));
    candidate.exists().then_some(candidate)
}

/// Per-video output folder: `<output_root>/<video stem>`.
pub fn video_output_dir(output_root: &Path, video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    output_root.join(stem)
}
