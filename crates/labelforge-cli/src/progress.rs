//! Shared progress tracking for in-flight releases.
//!
//! Workers never touch this directly; the orchestrator serializes every
//! update through the tracker's mutex.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use labelforge_core::{ProcessingStep, ReleaseProgress, ReleaseStatus};

/// Progress map plus cancellation flags, shared between the pipeline API
/// and the orchestrator.
#[derive(Default)]
pub struct ProgressTracker {
    progress: Mutex<HashMap<String, ReleaseProgress>>,
    cancel_flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh release and returns its cancellation flag.
    pub fn register(&self, release_id: &str) -> Arc<AtomicBool> {
        let mut progress = self.lock_progress();
        progress.insert(release_id.to_string(), ReleaseProgress::new(release_id));

        let flag = Arc::new(AtomicBool::new(false));
        self.lock_flags()
            .insert(release_id.to_string(), Arc::clone(&flag));
        flag
    }

    /// Snapshot of one release's progress.
    pub fn get(&self, release_id: &str) -> Option<ReleaseProgress> {
        self.lock_progress().get(release_id).cloned()
    }

    /// Applies an update under the tracker lock.
    pub fn update(&self, release_id: &str, f: impl FnOnce(&mut ReleaseProgress)) {
        if let Some(entry) = self.lock_progress().get_mut(release_id) {
            f(entry);
        }
    }

    /// Marks the release processing and stamps the start time.
    pub fn start(&self, release_id: &str, total_images: u64) {
        self.update(release_id, |p| {
            p.status = ReleaseStatus::Processing;
            p.total_images = total_images;
            p.started_at = Some(Utc::now());
        });
    }

    /// Moves the release to a pipeline step.
    pub fn advance(&self, release_id: &str, step: ProcessingStep) {
        self.update(release_id, |p| p.advance(step));
    }

    /// Marks the release terminal.
    pub fn finish(&self, release_id: &str, status: ReleaseStatus, error: Option<String>) {
        self.update(release_id, |p| {
            p.status = status;
            p.error_message = error;
            p.completed_at = Some(Utc::now());
            if status == ReleaseStatus::Completed {
                p.advance(ProcessingStep::Completed);
            }
        });
    }

    /// Requests cancellation; honored at the next image boundary.
    pub fn request_cancel(&self, release_id: &str) -> bool {
        match self.lock_flags().get(release_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    fn lock_progress(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, ReleaseProgress>> {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_flags(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AtomicBool>>> {
        self.cancel_flags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_update() {
        let tracker = ProgressTracker::new();
        tracker.register("rel-1");
        tracker.start("rel-1", 10);
        tracker.advance("rel-1", ProcessingStep::ProcessingImages);
        tracker.update("rel-1", |p| p.record_processed(5, 15));

        let progress = tracker.get("rel-1").unwrap();
        assert_eq!(progress.status, ReleaseStatus::Processing);
        assert_eq!(progress.processed_images, 5);
        assert_eq!(progress.generated_images, 15);
        assert!(progress.started_at.is_some());
        assert!(progress.progress_percentage > 20.0);
    }

    #[test]
    fn test_cancel_flag_round_trip() {
        let tracker = ProgressTracker::new();
        let flag = tracker.register("rel-1");
        assert!(!flag.load(Ordering::SeqCst));
        assert!(tracker.request_cancel("rel-1"));
        assert!(flag.load(Ordering::SeqCst));
        assert!(!tracker.request_cancel("rel-unknown"));
    }

    #[test]
    fn test_finish_stamps_completion() {
        let tracker = ProgressTracker::new();
        tracker.register("rel-1");
        tracker.finish("rel-1", ReleaseStatus::Failed, Some("boom".into()));
        let progress = tracker.get("rel-1").unwrap();
        assert_eq!(progress.status, ReleaseStatus::Failed);
        assert_eq!(progress.error_message.as_deref(), Some("boom"));
        assert!(progress.completed_at.is_some());
    }
}
