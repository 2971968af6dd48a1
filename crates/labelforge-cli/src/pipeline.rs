//! Public pipeline API.
//!
//! This is the surface any caller (HTTP handler, CLI, test harness) drives:
//! generate a release, poll its progress, list history, clean up failures.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use labelforge_core::{Release, ReleaseConfig, ReleaseError, ReleaseProgress, ReleaseStatus};

use crate::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::progress::ProgressTracker;
use crate::store::ReleaseStore;

/// Release pipeline over a storage backend.
pub struct ReleasePipeline<S: ReleaseStore> {
    store: S,
    project_root: PathBuf,
    tracker: Arc<ProgressTracker>,
    options: OrchestratorOptions,
}

impl<S: ReleaseStore> ReleasePipeline<S> {
    pub fn new(store: S, project_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            project_root: project_root.into(),
            tracker: Arc::new(ProgressTracker::new()),
            options: OrchestratorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Shared progress tracker (e.g. to poll from another thread while a
    /// release runs).
    pub fn tracker(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.tracker)
    }

    /// Generates a release and returns its id.
    ///
    /// Runs to a terminal state before returning; a failed run still
    /// returns the release id, with the failure recorded on the release
    /// and in the progress map. Only a rejected configuration (or a store
    /// failure creating the record) returns `Err`.
    pub fn generate_release(
        &self,
        config: &ReleaseConfig,
        release_version: &str,
    ) -> Result<String, ReleaseError> {
        let orchestrator = Orchestrator::new(
            &self.store,
            &self.project_root,
            &self.tracker,
            self.options.clone(),
        );
        let release = orchestrator.run(config, release_version)?;
        Ok(release.id)
    }

    /// Progress snapshot for a release.
    ///
    /// Falls back to the persisted release record when the release is not
    /// (or no longer) in the in-process map.
    pub fn get_release_progress(&self, release_id: &str) -> Option<ReleaseProgress> {
        if let Some(progress) = self.tracker.get(release_id) {
            return Some(progress);
        }
        let release = self.store.get_release(release_id).ok().flatten()?;
        let mut progress = ReleaseProgress::new(release_id);
        progress.status = release.status;
        progress.error_message = release.error_message.clone();
        progress.total_images = release.total_original_images;
        progress.processed_images = release.total_original_images;
        progress.generated_images = release.final_image_count;
        if release.status == ReleaseStatus::Completed {
            progress.advance(labelforge_core::ProcessingStep::Completed);
        }
        Some(progress)
    }

    /// Releases for a project, newest first.
    pub fn get_release_history(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<Release>, ReleaseError> {
        self.store
            .releases_for_project(project_id, limit)
            .map_err(|e| ReleaseError::Store(e.to_string()))
    }

    /// Requests cancellation of an in-flight release; honored at the next
    /// image boundary.
    pub fn cancel_release(&self, release_id: &str) -> bool {
        self.tracker.request_cancel(release_id)
    }

    /// Removes the artifacts of a failed release: ZIP, release directory,
    /// and the release record. Idempotent; a missing release is fine.
    pub fn cleanup_failed_release(
        &self,
        release_id: &str,
        project_id: Option<&str>,
    ) -> Result<(), ReleaseError> {
        let release = self
            .store
            .get_release(release_id)
            .map_err(|e| ReleaseError::Store(e.to_string()))?;

        let project = match (&release, project_id) {
            (Some(r), _) => Some(r.project_id.clone()),
            (None, Some(p)) => Some(p.to_string()),
            (None, None) => None,
        };

        if let Some(project) = project {
            let releases_dir = self
                .project_root
                .join("projects")
                .join(&project)
                .join("releases");
            let release_dir = releases_dir.join(release_id);
            if release_dir.exists() {
                fs::remove_dir_all(&release_dir)?;
            }
            if let Some(r) = &release {
                if let Some(model_path) = &r.model_path {
                    let zip = self.project_root.join(model_path);
                    remove_if_exists(&zip)?;
                }
            }
        }

        if let Some(r) = &release {
            if r.status != ReleaseStatus::Completed {
                self.store
                    .delete_release(release_id)
                    .map_err(|e| ReleaseError::Store(e.to_string()))?;
                info!(release_id, "failed release cleaned up");
            }
        }
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
