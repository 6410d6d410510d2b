use crate::cli::ServeArgs;
use crate::extraction::{extract_video, Method};
use crate::redaction::blur::BlurConfig;
use crate::redaction::detector::RtdetrDetector;
use crate::redaction::{redact, DetectorFailure, RedactionJob};
use crate::run_context::{list_videos, resolve_track, video_output_dir};
use crate::web::jobs::{self, JobKind};
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;

type ApiError = (StatusCode, String);

fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.into())
}

#[derive(Serialize)]
pub struct VideoInfo {
    pub name: String,
    pub path: String,
    /// GPX track with the same stem found next to the video
    pub track: Option<String>,
}

pub async fn get_videos(State(args): State<Arc<ServeArgs>>) -> Json<Vec<VideoInfo>> {
    let videos = list_videos(&args.video_root);

    let info_list = videos
        .into_iter()
        .map(|video_path| {
            let name = video_path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();
            let track = resolve_track(&video_path, &args.video_root)
                .map(|p| p.to_string_lossy().to_string());
            VideoInfo {
                name,
                path: video_path.to_string_lossy().to_string(),
                track,
            }
        })
        .collect();

    Json(info_list)
}

fn default_extension() -> String {
    "jpg".to_string()
}

#[derive(Deserialize)]
pub struct ExtractRequest {
    /// Video path, relative to the video root unless absolute
    pub video: String,
    #[serde(flatten)]
    pub method: Method,
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Relative paths are taken from `root`.
fn under_root(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub async fn start_extract(
    State(args): State<Arc<ServeArgs>>,
    Json(payload): Json<ExtractRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let video_path = under_root(&args.video_root, Path::new(&payload.video));
    if !video_path.is_file() {
        return Err(bad_request(format!(
            "Video not found: {}",
            video_path.display()
        )));
    }

    let method = match payload.method {
        Method::Gps {
            track_path,
            interval_m,
        } => Method::Gps {
            track_path: under_root(&args.video_root, &track_path),
            interval_m,
        },
        other => other,
    };
    let output_dir = video_output_dir(&args.output_root, &video_path);
    let extension = payload.extension;

    let state = jobs::spawn_job(JobKind::Extract, payload.video, move |control, progress| {
        let report = extract_video(
            &video_path,
            &method,
            &output_dir,
            &extension,
            control,
            progress,
        )?;
        Ok(serde_json::json!({
            "output_dir": output_dir,
            "frames": report.frames.len(),
            "skipped": report.skipped,
        }))
    });

    Ok(Json(state.to_progress_json()))
}

#[derive(Deserialize)]
pub struct RedactRequest {
    /// Frame folder, relative to the output root unless absolute
    pub input_folder: String,
    /// Defaults to `<input_folder>_redacted`
    pub output_folder: Option<String>,
    pub confidence_threshold: Option<f32>,
    pub batch_size: Option<usize>,
    pub batch_threshold: Option<usize>,
    pub blur: Option<BlurConfig>,
    #[serde(default)]
    pub on_detector_error: DetectorFailure,
}

impl RedactRequest {
    fn into_job(self, output_root: &Path) -> RedactionJob {
        let input = under_root(output_root, Path::new(&self.input_folder));
        let output = match &self.output_folder {
            Some(folder) => under_root(output_root, Path::new(folder)),
            None => {
                let mut name = input.as_os_str().to_os_string();
                name.push("_redacted");
                PathBuf::from(name)
            }
        };

        let mut job = RedactionJob::new(&input, &output);
        if let Some(confidence) = self.confidence_threshold {
            job.confidence_threshold = confidence;
        }
        if let Some(size) = self.batch_size {
            job.batch_size = size;
        }
        if let Some(threshold) = self.batch_threshold {
            job.batch_threshold = threshold;
        }
        if let Some(blur) = self.blur {
            job.blur = BlurConfig::new(blur.kernel, blur.sigma);
        }
        job.on_detector_error = self.on_detector_error;
        job
    }
}

pub async fn start_redact(
    State(args): State<Arc<ServeArgs>>,
    Json(payload): Json<RedactRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let label = payload.input_folder.clone();
    let job = payload.into_job(&args.output_root);
    if !job.input_folder.is_dir() {
        return Err(bad_request(format!(
            "Input folder not found: {}",
            job.input_folder.display()
        )));
    }
    let model_path = args.model.clone();

    let state = jobs::spawn_job(JobKind::Redact, label, move |control, progress| {
        let mut detector = RtdetrDetector::new(&model_path)?;
        let summary = redact(&job, &mut detector, control, progress)?;
        Ok(serde_json::json!({
            "output_folder": job.output_folder,
            "summary": summary,
        }))
    });

    Ok(Json(state.to_progress_json()))
}

pub async fn get_jobs() -> Json<Vec<serde_json::Value>> {
    Json(
        jobs::list_jobs()
            .iter()
            .map(|state| state.to_progress_json())
            .collect(),
    )
}

pub async fn get_job(UrlPath(id): UrlPath<String>) -> Result<Json<serde_json::Value>, StatusCode> {
    jobs::get_job(&id)
        .map(|state| Json(state.to_progress_json()))
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn stop_job(UrlPath(id): UrlPath<String>) -> StatusCode {
    if jobs::stop_job(&id) {
        StatusCode::ACCEPTED
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Streams the job's progress record until it completes.
pub async fn job_events(
    UrlPath(id): UrlPath<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let state = jobs::get_job(&id).ok_or(StatusCode::NOT_FOUND)?;

    let stream = async_stream::stream! {
        loop {
            let payload = state.to_progress_json();
            yield Ok(Event::default().event("progress").data(payload.to_string()));
            if state.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
