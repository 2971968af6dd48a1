//! Error types for release configuration validation and pipeline execution.

use thiserror::Error;

/// Error codes for release configuration and transform validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Release config errors (E001-E009)
    /// E001: Invalid release name format
    InvalidReleaseName,
    /// E002: No source datasets selected
    NoDatasets,
    /// E003: images_per_original below 1
    InvalidMultiplier,
    /// E004: Empty split_sections selection
    NoSplitSections,
    /// E005: Missing project id
    MissingProjectId,

    // Transform errors (E010-E016)
    /// E010: Unknown transformation type
    UnknownTransformType,
    /// E011: Unknown parameter key for the transform kind
    UnknownParameter,
    /// E012: Parameter has the wrong type
    InvalidParameter,
    /// E013: Parameter value out of the declared range
    ParameterOutOfRange,
    /// E014: Range parameter with min > max or bounds outside the declared range
    InvalidParameterRange,
    /// E015: Required parameter missing
    MissingParameter,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidReleaseName => "E001",
            ErrorCode::NoDatasets => "E002",
            ErrorCode::InvalidMultiplier => "E003",
            ErrorCode::NoSplitSections => "E004",
            ErrorCode::MissingProjectId => "E005",
            ErrorCode::UnknownTransformType => "E010",
            ErrorCode::UnknownParameter => "E011",
            ErrorCode::InvalidParameter => "E012",
            ErrorCode::ParameterOutOfRange => "E013",
            ErrorCode::InvalidParameterRange => "E014",
            ErrorCode::MissingParameter => "E015",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Warning codes for release configuration validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCode {
    /// W001: Missing description
    MissingDescription,
    /// W002: Missing seed (defaulted to 0)
    MissingSeed,
    /// W003: Multiplier of 1 with include_original produces no augmentations
    NoAugmentationsPlanned,
}

impl WarningCode {
    /// Returns the warning code string (e.g., "W001").
    pub fn code(&self) -> &'static str {
        match self {
            WarningCode::MissingDescription => "W001",
            WarningCode::MissingSeed => "W002",
            WarningCode::NoAugmentationsPlanned => "W003",
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A validation error with code, message, and optional field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Path to the problematic field (e.g., "transforms\[0\].parameters.angle").
    pub path: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Creates a new validation error with a field path.
    pub fn with_path(code: ErrorCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// A validation warning with code and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The warning code.
    pub code: WarningCode,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Creates a new validation warning.
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Result of validating a release configuration or transform record.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of validation warnings.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Creates an empty (successful) validation result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Merges another result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts to a Result, returning Err if there are errors.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(self.errors)
        }
    }
}

/// Pipeline error taxonomy.
///
/// Per-item variants (`SourceMissing`, `DecodeFailed`, `TransformFailed`,
/// `AnnotationMalformed`, `ExportFailed`) are recorded as warnings and the
/// release continues; the remaining variants abort the release.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// Malformed release configuration or transform parameters.
    #[error("invalid release configuration: {0} error(s)")]
    InvalidConfig(usize),

    /// No enabled PENDING transforms while the multiplier requires them.
    #[error("no pending transformations available for release version '{release_version}'")]
    NoTransformsAvailable { release_version: String },

    /// Source image file not found on disk.
    #[error("source image '{path}' for image {image_id} not found")]
    SourceMissing { image_id: String, path: String },

    /// Source image exists but cannot be decoded.
    #[error("failed to decode image '{path}': {reason}")]
    DecodeFailed { path: String, reason: String },

    /// The engine failed on a single augmentation config.
    #[error("transform pipeline failed for config {config_id}: {reason}")]
    TransformFailed { config_id: String, reason: String },

    /// An annotation could not be parsed or bounded.
    #[error("malformed annotation on image {image_id}: {reason}")]
    AnnotationMalformed { image_id: String, reason: String },

    /// The emitter failed for a specific image.
    #[error("export failed for '{image}': {reason}")]
    ExportFailed { image: String, reason: String },

    /// ZIP assembly or metadata writing failed.
    #[error("packaging failed: {0}")]
    PackagingFailed(String),

    /// The atomic transform-completion update failed.
    #[error("transform completion transaction failed: {0}")]
    TransactionFailed(String),

    /// Storage layer failure.
    #[error("store error: {0}")]
    Store(String),

    /// The release was cancelled by the caller.
    #[error("release cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReleaseError {
    /// Returns true if this error aborts the whole release rather than
    /// being recorded and skipped.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ReleaseError::SourceMissing { .. }
                | ReleaseError::DecodeFailed { .. }
                | ReleaseError::TransformFailed { .. }
                | ReleaseError::AnnotationMalformed { .. }
                | ReleaseError::ExportFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::InvalidReleaseName.code(), "E001");
        assert_eq!(ErrorCode::UnknownTransformType.code(), "E010");
        assert_eq!(ErrorCode::ParameterOutOfRange.code(), "E013");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new(ErrorCode::InvalidMultiplier, "must be at least 1");
        assert_eq!(err.to_string(), "E003: must be at least 1");

        let err = ValidationError::with_path(
            ErrorCode::ParameterOutOfRange,
            "angle 300 outside [-180, 180]",
            "parameters.angle",
        );
        assert_eq!(
            err.to_string(),
            "E013: angle 300 outside [-180, 180] (at parameters.angle)"
        );
    }

    #[test]
    fn test_validation_result_accumulates() {
        let mut result = ValidationResult::new();
        assert!(result.is_ok());

        result.add_error(ValidationError::new(ErrorCode::NoDatasets, "no datasets"));
        result.add_warning(ValidationWarning::new(
            WarningCode::MissingSeed,
            "seed defaulted to 0",
        ));
        assert!(!result.is_ok());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(!ReleaseError::SourceMissing {
            image_id: "img-1".into(),
            path: "a.jpg".into()
        }
        .is_fatal());
        assert!(ReleaseError::PackagingFailed("zip".into()).is_fatal());
        assert!(ReleaseError::TransactionFailed("rollback".into()).is_fatal());
        assert!(ReleaseError::Cancelled.is_fatal());
    }
}
