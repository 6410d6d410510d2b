use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation for a running job.
///
/// Jobs poll `check` once per frame or image. Clearing the shared flag makes
/// the next poll fail with `Error::Cancelled`.
#[derive(Clone, Default)]
pub struct JobControl {
    active: Option<Arc<AtomicBool>>,
}

impl JobControl {
    pub fn new(active: Arc<AtomicBool>) -> Self {
        Self {
            active: Some(active),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(true)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }
}
