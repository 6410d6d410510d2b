// Job registry: runs extraction and redaction jobs on their own threads and
// tracks their state for the HTTP layer.

use crate::control::JobControl;
use crate::error::Error;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

// Global registry of jobs started by this process
lazy_static::lazy_static! {
    static ref JOB_REGISTRY: RwLock<BTreeMap<String, Arc<JobState>>> =
        RwLock::new(BTreeMap::new());
}

static NEXT_JOB_ID: AtomicUsize = AtomicUsize::new(1);

/// Finished jobs kept for inspection; older ones are dropped on registration.
const MAX_FINISHED_JOBS: usize = 64;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Extract,
    Redact,
}

impl JobKind {
    fn as_str(&self) -> &'static str {
        match self {
            JobKind::Extract => "extract",
            JobKind::Redact => "redact",
        }
    }
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct JobProgress {
    pub current: usize,
    pub total: usize,
}

/// State shared between a job thread and the HTTP handlers
#[derive(Debug)]
pub struct JobState {
    pub id: String,
    pub kind: JobKind,
    /// What the job works on (video name or input folder)
    pub label: String,
    /// Cleared to request cancellation
    pub is_active: Arc<AtomicBool>,
    pub is_complete: AtomicBool,
    pub error: RwLock<Option<String>>,
    pub progress: RwLock<JobProgress>,
    pub result: RwLock<Option<serde_json::Value>>,
    pub start_time: std::time::Instant,
}

impl JobState {
    pub fn new(id: String, kind: JobKind, label: String) -> Self {
        Self {
            id,
            kind,
            label,
            is_active: Arc::new(AtomicBool::new(true)),
            is_complete: AtomicBool::new(false),
            error: RwLock::new(None),
            progress: RwLock::new(JobProgress::default()),
            result: RwLock::new(None),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn control(&self) -> JobControl {
        JobControl::new(self.is_active.clone())
    }

    pub fn update_progress(&self, current: usize, total: usize) {
        if let Ok(mut progress) = self.progress.write() {
            progress.current = current;
            progress.total = total;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.is_complete.load(Ordering::Relaxed)
    }

    fn finish(&self, outcome: Result<serde_json::Value, Error>) {
        match outcome {
            Ok(result) => {
                if let Ok(mut slot) = self.result.write() {
                    *slot = Some(result);
                }
            }
            Err(e) => {
                if let Ok(mut slot) = self.error.write() {
                    *slot = Some(e.to_string());
                }
            }
        }
        self.is_active.store(false, Ordering::Relaxed);
        self.is_complete.store(true, Ordering::Relaxed);
    }

    pub fn to_progress_json(&self) -> serde_json::Value {
        let progress = self
            .progress
            .read()
            .map(|p| p.clone())
            .unwrap_or_default();
        let error = self.error.read().ok().and_then(|e| e.clone());
        let result = self.result.read().ok().and_then(|r| r.clone());

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            progress.current as f64 / elapsed
        } else {
            0.0
        };

        serde_json::json!({
            "id": self.id,
            "kind": self.kind,
            "label": self.label,
            "is_active": self.is_active.load(Ordering::Relaxed),
            "is_complete": self.is_complete.load(Ordering::Relaxed),
            "error": error,
            "current": progress.current,
            "total": progress.total,
            "items_per_sec": rate,
            "result": result,
        })
    }
}

pub fn get_job(id: &str) -> Option<Arc<JobState>> {
    JOB_REGISTRY.read().ok()?.get(id).cloned()
}

pub fn list_jobs() -> Vec<Arc<JobState>> {
    JOB_REGISTRY
        .read()
        .map(|jobs| jobs.values().cloned().collect())
        .unwrap_or_default()
}

fn register_job(state: Arc<JobState>) {
    tracing::info!("Registering job {} ({})", state.id, state.label);
    if let Ok(mut jobs) = JOB_REGISTRY.write() {
        evict_finished(&mut jobs, MAX_FINISHED_JOBS);
        jobs.insert(state.id.clone(), state);
    }
}

/// Drops the oldest finished jobs until at most `keep` remain. Running jobs
/// are never dropped.
fn evict_finished(jobs: &mut BTreeMap<String, Arc<JobState>>, keep: usize) {
    let mut finished: Vec<(std::time::Instant, String)> = jobs
        .values()
        .filter(|job| job.is_finished())
        .map(|job| (job.start_time, job.id.clone()))
        .collect();
    if finished.len() <= keep {
        return;
    }
    finished.sort();
    let excess = finished.len() - keep;
    for (_, id) in finished.into_iter().take(excess) {
        tracing::debug!("Evicting finished job {}", id);
        jobs.remove(&id);
    }
}

/// Registers a job and runs `work` on a dedicated thread.
///
/// `work` receives the job's cancellation control and a progress callback;
/// its result (or error) is stored on the returned state once it finishes.
pub fn spawn_job<F>(kind: JobKind, label: String, work: F) -> Arc<JobState>
where
    F: FnOnce(&JobControl, &mut dyn FnMut(usize, usize)) -> Result<serde_json::Value, Error>
        + Send
        + 'static,
{
    let id = format!(
        "{}-{}",
        kind.as_str(),
        NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)
    );
    let state = Arc::new(JobState::new(id, kind, label));
    register_job(state.clone());

    let job_state = state.clone();
    thread::spawn(move || {
        tracing::info!("Starting job {}", job_state.id);
        let control = job_state.control();
        let progress_state = job_state.clone();
        let mut progress = move |current: usize, total: usize| {
            progress_state.update_progress(current, total)
        };
        let outcome = work(&control, &mut progress);

        match &outcome {
            Ok(_) => tracing::info!("Job {} finished", job_state.id),
            Err(Error::Cancelled) => tracing::info!("Job {} stopped", job_state.id),
            Err(e) => tracing::error!("Job {} failed: {}", job_state.id, e),
        }
        job_state.finish(outcome);
    });

    state
}

/// Requests cancellation of a job. Returns false for unknown ids.
pub fn stop_job(id: &str) -> bool {
    if let Some(state) = get_job(id) {
        state.is_active.store(false, Ordering::Relaxed);
        true
    } else {
        false
    }
}
