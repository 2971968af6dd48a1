//! Progress reporting types for in-flight releases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::release::ReleaseStatus;

/// Substates of a `processing` release, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStep {
    LoadingData,
    GeneratingConfigurations,
    ProcessingImages,
    Finalizing,
    CreatingZipPackage,
    Completed,
}

impl ProcessingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStep::LoadingData => "loading_data",
            ProcessingStep::GeneratingConfigurations => "generating_configurations",
            ProcessingStep::ProcessingImages => "processing_images",
            ProcessingStep::Finalizing => "finalizing",
            ProcessingStep::CreatingZipPackage => "creating_zip_package",
            ProcessingStep::Completed => "completed",
        }
    }

    /// Progress percentage at which this step begins.
    ///
    /// Image processing dominates wall-clock time and owns the bulk of the
    /// range; `processing_images` interpolates inside its span using the
    /// processed/total ratio.
    pub fn base_percentage(&self) -> f32 {
        match self {
            ProcessingStep::LoadingData => 0.0,
            ProcessingStep::GeneratingConfigurations => 10.0,
            ProcessingStep::ProcessingImages => 20.0,
            ProcessingStep::Finalizing => 80.0,
            ProcessingStep::CreatingZipPackage => 90.0,
            ProcessingStep::Completed => 100.0,
        }
    }
}

impl std::fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of a release's progress, served by the pipeline API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseProgress {
    pub release_id: String,
    pub status: ReleaseStatus,
    pub progress_percentage: f32,
    pub current_step: ProcessingStep,
    pub total_images: u64,
    pub processed_images: u64,
    pub generated_images: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReleaseProgress {
    /// Fresh progress for a just-created release.
    pub fn new(release_id: impl Into<String>) -> Self {
        Self {
            release_id: release_id.into(),
            status: ReleaseStatus::Pending,
            progress_percentage: 0.0,
            current_step: ProcessingStep::LoadingData,
            total_images: 0,
            processed_images: 0,
            generated_images: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Moves to a step, recomputing the percentage from the step base and
    /// the processed-image ratio.
    pub fn advance(&mut self, step: ProcessingStep) {
        self.current_step = step;
        self.progress_percentage = self.computed_percentage();
    }

    /// Records image progress within the `processing_images` span.
    pub fn record_processed(&mut self, processed: u64, generated: u64) {
        self.processed_images = processed;
        self.generated_images = generated;
        self.progress_percentage = self.computed_percentage();
    }

    fn computed_percentage(&self) -> f32 {
        let base = self.current_step.base_percentage();
        if self.current_step == ProcessingStep::ProcessingImages && self.total_images > 0 {
            let span = ProcessingStep::Finalizing.base_percentage() - base;
            base + span * (self.processed_images as f32 / self.total_images as f32)
        } else {
            base
        }
    }
}

/// A non-fatal incident recorded while a release runs.
///
/// Warnings are counted, carried through to `release_config.json`, and never
/// abort the release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseWarning {
    /// Pipeline step that recorded the warning.
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    pub message: String,
}

impl ReleaseWarning {
    pub fn new(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            image_id: None,
            config_id: None,
            transform: None,
            message: message.into(),
        }
    }

    pub fn with_image(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn with_config(mut self, config_id: impl Into<String>) -> Self {
        self.config_id = Some(config_id.into());
        self
    }

    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_percentages_monotonic() {
        let steps = [
            ProcessingStep::LoadingData,
            ProcessingStep::GeneratingConfigurations,
            ProcessingStep::ProcessingImages,
            ProcessingStep::Finalizing,
            ProcessingStep::CreatingZipPackage,
            ProcessingStep::Completed,
        ];
        for pair in steps.windows(2) {
            assert!(pair[0].base_percentage() < pair[1].base_percentage());
        }
    }

    #[test]
    fn test_progress_interpolates_image_span() {
        let mut progress = ReleaseProgress::new("rel-1");
        progress.total_images = 100;
        progress.advance(ProcessingStep::ProcessingImages);
        assert_eq!(progress.progress_percentage, 20.0);

        progress.record_processed(50, 150);
        assert_eq!(progress.progress_percentage, 50.0);

        progress.advance(ProcessingStep::CreatingZipPackage);
        assert_eq!(progress.progress_percentage, 90.0);
    }

    #[test]
    fn test_warning_builder_keys() {
        let warning = ReleaseWarning::new("processing_images", "decode failed")
            .with_image("img-9")
            .with_config("cfg-2")
            .with_transform("rotate");
        assert_eq!(warning.image_id.as_deref(), Some("img-9"));
        assert_eq!(warning.config_id.as_deref(), Some("cfg-2"));
        assert_eq!(warning.transform.as_deref(), Some("rotate"));
    }
}
