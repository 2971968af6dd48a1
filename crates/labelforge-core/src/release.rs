//! Release configuration and the persisted release record.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{
    ErrorCode, ValidationError, ValidationResult, ValidationWarning, WarningCode,
};
use crate::record::SplitSection;

/// Target on-disk annotation format for a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Resolved to a concrete format from the task type and annotation mix.
    Auto,
    YoloDetection,
    YoloSegmentation,
    Coco,
    PascalVoc,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Auto => "auto",
            ExportFormat::YoloDetection => "yolo_detection",
            ExportFormat::YoloSegmentation => "yolo_segmentation",
            ExportFormat::Coco => "coco",
            ExportFormat::PascalVoc => "pascal_voc",
            ExportFormat::Csv => "csv",
        }
    }

    /// True for the formats that ship a `data.yaml` next to the splits.
    pub fn is_yolo(&self) -> bool {
        matches!(self, ExportFormat::YoloDetection | ExportFormat::YoloSegmentation)
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ExportFormat::Auto),
            "yolo_detection" => Ok(ExportFormat::YoloDetection),
            "yolo_segmentation" => Ok(ExportFormat::YoloSegmentation),
            "coco" => Ok(ExportFormat::Coco),
            "pascal_voc" => Ok(ExportFormat::PascalVoc),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(format!("unknown export format: {}", s)),
        }
    }
}

/// Annotation task the release serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ObjectDetection,
    Segmentation,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::ObjectDetection => "object_detection",
            TaskType::Segmentation => "segmentation",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "object_detection" => Ok(TaskType::ObjectDetection),
            "segmentation" => Ok(TaskType::Segmentation),
            _ => Err(format!("unknown task type: {}", s)),
        }
    }
}

/// How the planner picks transform combinations for each output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Diversity-weighted sampling over combinations of enabled transforms.
    Intelligent,
    /// All combinations in deterministic order, up to the multiplier.
    Exhaustive,
    /// Uniform draws.
    Random,
}

impl SamplingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingStrategy::Intelligent => "intelligent",
            SamplingStrategy::Exhaustive => "exhaustive",
            SamplingStrategy::Random => "random",
        }
    }
}

impl std::fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SamplingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intelligent" => Ok(SamplingStrategy::Intelligent),
            "exhaustive" => Ok(SamplingStrategy::Exhaustive),
            "random" => Ok(SamplingStrategy::Random),
            _ => Err(format!("unknown sampling strategy: {}", s)),
        }
    }
}

/// Pixel format of the emitted images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputImageFormat {
    /// Keep the source extension per image.
    Original,
    Jpg,
    Png,
    Webp,
    Bmp,
    Tiff,
}

impl OutputImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputImageFormat::Original => "original",
            OutputImageFormat::Jpg => "jpg",
            OutputImageFormat::Png => "png",
            OutputImageFormat::Webp => "webp",
            OutputImageFormat::Bmp => "bmp",
            OutputImageFormat::Tiff => "tiff",
        }
    }

    /// File extension for this format, or `None` for `original`.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            OutputImageFormat::Original => None,
            other => Some(other.as_str()),
        }
    }
}

impl std::fmt::Display for OutputImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Regex pattern for valid release names.
const RELEASE_NAME_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9 ._-]{0,127}$";

static RELEASE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn release_name_regex() -> &'static Regex {
    RELEASE_NAME_REGEX.get_or_init(|| Regex::new(RELEASE_NAME_PATTERN).expect("invalid regex pattern"))
}

fn default_multiplier() -> u32 {
    1
}

fn default_include_original() -> bool {
    true
}

fn default_preserve_splits() -> bool {
    true
}

fn default_export_format() -> ExportFormat {
    ExportFormat::Auto
}

fn default_output_format() -> OutputImageFormat {
    OutputImageFormat::Original
}

fn default_sampling() -> SamplingStrategy {
    SamplingStrategy::Intelligent
}

/// Declarative description of the release to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Display name; also the stem of the output ZIP.
    pub release_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub project_id: String,

    /// Source datasets merged into this release.
    pub dataset_ids: Vec<String>,

    #[serde(default = "default_export_format")]
    pub export_format: ExportFormat,

    pub task_type: TaskType,

    /// Output images per source image, the original included when
    /// `include_original` is set.
    #[serde(default = "default_multiplier")]
    pub images_per_original: u32,

    #[serde(default = "default_sampling")]
    pub sampling_strategy: SamplingStrategy,

    #[serde(default = "default_output_format")]
    pub output_format: OutputImageFormat,

    #[serde(default = "default_include_original")]
    pub include_original: bool,

    /// Restrict the source image set to these splits; `None` means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_sections: Option<Vec<SplitSection>>,

    #[serde(default = "default_preserve_splits")]
    pub preserve_original_splits: bool,

    /// Deterministic RNG seed; defaults to 0 with a warning when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ReleaseConfig {
    /// Creates a new config builder.
    pub fn builder(
        release_name: impl Into<String>,
        project_id: impl Into<String>,
        task_type: TaskType,
    ) -> ReleaseConfigBuilder {
        ReleaseConfigBuilder::new(release_name, project_id, task_type)
    }

    /// Parses a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the config to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Effective seed (0 when unset).
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or(0)
    }

    /// Splits the release draws from (all three when unrestricted).
    pub fn effective_splits(&self) -> Vec<SplitSection> {
        match &self.split_sections {
            Some(s) if !s.is_empty() => s.clone(),
            _ => SplitSection::all().to_vec(),
        }
    }

    /// Validates the configuration, fail-fast before any staging happens.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !release_name_regex().is_match(&self.release_name) {
            result.add_error(ValidationError::with_path(
                ErrorCode::InvalidReleaseName,
                "release_name must start alphanumeric and contain only letters, digits, spaces, '.', '_' or '-'",
                "release_name",
            ));
        }

        if self.project_id.is_empty() {
            result.add_error(ValidationError::with_path(
                ErrorCode::MissingProjectId,
                "project_id must not be empty",
                "project_id",
            ));
        }

        if self.dataset_ids.is_empty() {
            result.add_error(ValidationError::with_path(
                ErrorCode::NoDatasets,
                "at least one dataset is required",
                "dataset_ids",
            ));
        }

        if self.images_per_original < 1 {
            result.add_error(ValidationError::with_path(
                ErrorCode::InvalidMultiplier,
                "images_per_original must be at least 1",
                "images_per_original",
            ));
        }

        if matches!(&self.split_sections, Some(s) if s.is_empty()) {
            result.add_error(ValidationError::with_path(
                ErrorCode::NoSplitSections,
                "split_sections must not be empty when provided",
                "split_sections",
            ));
        }

        if self.description.as_deref().unwrap_or("").is_empty() {
            result.add_warning(ValidationWarning::new(
                WarningCode::MissingDescription,
                "release has no description",
            ));
        }

        if self.seed.is_none() {
            result.add_warning(ValidationWarning::new(
                WarningCode::MissingSeed,
                "seed not set; defaulting to 0",
            ));
        }

        if self.images_per_original == 1 && self.include_original {
            result.add_warning(ValidationWarning::new(
                WarningCode::NoAugmentationsPlanned,
                "multiplier 1 with include_original emits originals only",
            ));
        }

        result
    }
}

/// Builder for [`ReleaseConfig`].
#[derive(Debug, Clone)]
pub struct ReleaseConfigBuilder {
    config: ReleaseConfig,
}

impl ReleaseConfigBuilder {
    pub fn new(
        release_name: impl Into<String>,
        project_id: impl Into<String>,
        task_type: TaskType,
    ) -> Self {
        Self {
            config: ReleaseConfig {
                release_name: release_name.into(),
                description: None,
                project_id: project_id.into(),
                dataset_ids: Vec::new(),
                export_format: ExportFormat::Auto,
                task_type,
                images_per_original: 1,
                sampling_strategy: SamplingStrategy::Intelligent,
                output_format: OutputImageFormat::Original,
                include_original: true,
                split_sections: None,
                preserve_original_splits: true,
                seed: None,
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = Some(description.into());
        self
    }

    pub fn dataset(mut self, dataset_id: impl Into<String>) -> Self {
        self.config.dataset_ids.push(dataset_id.into());
        self
    }

    pub fn export_format(mut self, format: ExportFormat) -> Self {
        self.config.export_format = format;
        self
    }

    pub fn images_per_original(mut self, multiplier: u32) -> Self {
        self.config.images_per_original = multiplier;
        self
    }

    pub fn sampling_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.config.sampling_strategy = strategy;
        self
    }

    pub fn output_format(mut self, format: OutputImageFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn include_original(mut self, include: bool) -> Self {
        self.config.include_original = include;
        self
    }

    pub fn split_sections(mut self, splits: Vec<SplitSection>) -> Self {
        self.config.split_sections = Some(splits);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> ReleaseConfig {
        self.config
    }
}

/// Terminal and in-flight states of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Pending => "pending",
            ReleaseStatus::Processing => "processing",
            ReleaseStatus::Completed => "completed",
            ReleaseStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReleaseStatus::Completed | ReleaseStatus::Failed)
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The persisted release row: an immutable, versioned snapshot of the
/// exported dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Concrete format after `auto` resolution.
    pub export_format: ExportFormat,
    pub task_type: TaskType,
    pub datasets_used: Vec<String>,
    /// The configuration that produced this release, verbatim.
    pub config: ReleaseConfig,
    pub total_original_images: u64,
    pub total_augmented_images: u64,
    pub final_image_count: u64,
    pub train_image_count: u64,
    pub val_image_count: u64,
    pub test_image_count: u64,
    pub class_count: u64,
    /// Path to the ZIP, relative to the project root; set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    pub status: ReleaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Release {
    /// Creates a fresh `pending` release row for the given config.
    pub fn pending(config: &ReleaseConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: config.project_id.clone(),
            name: config.release_name.clone(),
            description: config.description.clone(),
            export_format: config.export_format,
            task_type: config.task_type,
            datasets_used: config.dataset_ids.clone(),
            config: config.clone(),
            total_original_images: 0,
            total_augmented_images: 0,
            final_image_count: 0,
            train_image_count: 0,
            val_image_count: 0,
            test_image_count: 0,
            class_count: 0,
            model_path: None,
            status: ReleaseStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn valid_config() -> ReleaseConfig {
        ReleaseConfig::builder("street-v1", "proj-1", TaskType::ObjectDetection)
            .description("street scenes")
            .dataset("ds-1")
            .images_per_original(3)
            .seed(42)
            .build()
    }

    #[test]
    fn test_valid_config_passes() {
        let result = valid_config().validate();
        assert!(result.is_ok(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_datasets_rejected() {
        let mut config = valid_config();
        config.dataset_ids.clear();
        let result = config.validate();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::NoDatasets);
    }

    #[test]
    fn test_bad_release_name_rejected() {
        let mut config = valid_config();
        config.release_name = "../escape".into();
        let result = config.validate();
        assert_eq!(result.errors[0].code, ErrorCode::InvalidReleaseName);
    }

    #[test]
    fn test_missing_seed_warns() {
        let mut config = valid_config();
        config.seed = None;
        let result = config.validate();
        assert!(result.is_ok());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == WarningCode::MissingSeed));
        assert_eq!(config.effective_seed(), 0);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = valid_config();
        let json = config.to_json_pretty().unwrap();
        let back = ReleaseConfig::from_json(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let json = r#"{
            "release_name": "r1",
            "project_id": "p1",
            "dataset_ids": ["d1"],
            "task_type": "object_detection",
            "compression": "zstd"
        }"#;
        assert!(ReleaseConfig::from_json(json).is_err());
    }

    #[test]
    fn test_config_defaults() {
        let json = r#"{
            "release_name": "r1",
            "project_id": "p1",
            "dataset_ids": ["d1"],
            "task_type": "segmentation"
        }"#;
        let config = ReleaseConfig::from_json(json).unwrap();
        assert_eq!(config.export_format, ExportFormat::Auto);
        assert_eq!(config.images_per_original, 1);
        assert_eq!(config.sampling_strategy, SamplingStrategy::Intelligent);
        assert_eq!(config.output_format, OutputImageFormat::Original);
        assert!(config.include_original);
        assert!(config.preserve_original_splits);
        assert_eq!(
            config.effective_splits(),
            vec![SplitSection::Train, SplitSection::Val, SplitSection::Test]
        );
    }

    #[test]
    fn test_pending_release_snapshot() {
        let config = valid_config();
        let release = Release::pending(&config);
        assert_eq!(release.status, ReleaseStatus::Pending);
        assert_eq!(release.name, "street-v1");
        assert_eq!(release.datasets_used, vec!["ds-1".to_string()]);
        assert!(release.model_path.is_none());
        // v4 UUIDs are 36 chars with hyphens
        assert_eq!(release.id.len(), 36);
    }
}
