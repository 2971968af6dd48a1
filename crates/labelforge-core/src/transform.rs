//! Transform catalog and parameter schema.
//!
//! Every transformation kind is declared centrally with its parameter names,
//! accepted ranges, defaults, and whether it is geometric (its effect must be
//! mirrored on annotation geometry) or photometric (pixels only).

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ValidationError, ValidationResult};

/// Canonical transformation kinds recognized by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Resize,
    Rotate,
    Flip,
    Crop,
    Brightness,
    Contrast,
    Blur,
    Noise,
    ColorJitter,
    Cutout,
    RandomZoom,
    AffineTransform,
    PerspectiveWarp,
    Grayscale,
    Shear,
    GammaCorrection,
    Equalize,
    Clahe,
}

impl TransformKind {
    /// Returns the canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::Resize => "resize",
            TransformKind::Rotate => "rotate",
            TransformKind::Flip => "flip",
            TransformKind::Crop => "crop",
            TransformKind::Brightness => "brightness",
            TransformKind::Contrast => "contrast",
            TransformKind::Blur => "blur",
            TransformKind::Noise => "noise",
            TransformKind::ColorJitter => "color_jitter",
            TransformKind::Cutout => "cutout",
            TransformKind::RandomZoom => "random_zoom",
            TransformKind::AffineTransform => "affine_transform",
            TransformKind::PerspectiveWarp => "perspective_warp",
            TransformKind::Grayscale => "grayscale",
            TransformKind::Shear => "shear",
            TransformKind::GammaCorrection => "gamma_correction",
            TransformKind::Equalize => "equalize",
            TransformKind::Clahe => "clahe",
        }
    }

    /// Returns all transform kinds.
    pub fn all() -> &'static [TransformKind] {
        &[
            TransformKind::Resize,
            TransformKind::Rotate,
            TransformKind::Flip,
            TransformKind::Crop,
            TransformKind::Brightness,
            TransformKind::Contrast,
            TransformKind::Blur,
            TransformKind::Noise,
            TransformKind::ColorJitter,
            TransformKind::Cutout,
            TransformKind::RandomZoom,
            TransformKind::AffineTransform,
            TransformKind::PerspectiveWarp,
            TransformKind::Grayscale,
            TransformKind::Shear,
            TransformKind::GammaCorrection,
            TransformKind::Equalize,
            TransformKind::Clahe,
        ]
    }

    /// Returns true if the transform changes pixel coordinates and must be
    /// propagated to annotation geometry.
    ///
    /// `cutout` erases pixels but moves nothing, so annotations pass through
    /// unchanged.
    pub fn affects_geometry(&self) -> bool {
        matches!(
            self,
            TransformKind::Resize
                | TransformKind::Rotate
                | TransformKind::Flip
                | TransformKind::Crop
                | TransformKind::Shear
                | TransformKind::AffineTransform
                | TransformKind::PerspectiveWarp
                | TransformKind::RandomZoom
        )
    }

    /// Returns true if the transform needs a per-step random stream at
    /// application time (noise patterns, hole placement, corner jitter).
    pub fn is_stochastic(&self) -> bool {
        matches!(
            self,
            TransformKind::Noise | TransformKind::Cutout | TransformKind::PerspectiveWarp
        )
    }
}

impl std::fmt::Display for TransformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransformKind::all()
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown transformation type: {}", s))
    }
}

/// Declaration of a single numeric parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

/// Declaration of a single enumerated (string) parameter.
#[derive(Debug, Clone, Copy)]
pub struct EnumParamSpec {
    pub name: &'static str,
    pub choices: &'static [&'static str],
    pub default: &'static str,
}

/// Numeric parameter declarations for a transform kind.
pub fn param_specs(kind: TransformKind) -> &'static [ParamSpec] {
    match kind {
        TransformKind::Resize => &[
            ParamSpec { name: "width", min: 16.0, max: 8192.0, default: 640.0 },
            ParamSpec { name: "height", min: 16.0, max: 8192.0, default: 640.0 },
            ParamSpec { name: "longest_side", min: 16.0, max: 8192.0, default: 640.0 },
        ],
        TransformKind::Rotate => &[ParamSpec { name: "angle", min: -180.0, max: 180.0, default: 15.0 }],
        TransformKind::Flip => &[],
        TransformKind::Crop => &[
            ParamSpec { name: "keep_fraction", min: 0.5, max: 1.0, default: 0.9 },
            ParamSpec { name: "x", min: 0.0, max: 16384.0, default: 0.0 },
            ParamSpec { name: "y", min: 0.0, max: 16384.0, default: 0.0 },
            ParamSpec { name: "width", min: 1.0, max: 16384.0, default: 0.0 },
            ParamSpec { name: "height", min: 1.0, max: 16384.0, default: 0.0 },
        ],
        TransformKind::Brightness => &[ParamSpec { name: "percent", min: -50.0, max: 50.0, default: 10.0 }],
        TransformKind::Contrast => &[ParamSpec { name: "percent", min: -50.0, max: 50.0, default: 10.0 }],
        TransformKind::Blur => &[ParamSpec { name: "radius", min: 0.1, max: 10.0, default: 1.5 }],
        TransformKind::Noise => &[ParamSpec { name: "strength", min: 0.0, max: 25.0, default: 5.0 }],
        TransformKind::ColorJitter => &[
            ParamSpec { name: "hue", min: -30.0, max: 30.0, default: 5.0 },
            ParamSpec { name: "saturation", min: -50.0, max: 50.0, default: 10.0 },
            ParamSpec { name: "brightness", min: -50.0, max: 50.0, default: 10.0 },
            ParamSpec { name: "contrast", min: -50.0, max: 50.0, default: 10.0 },
        ],
        TransformKind::Cutout => &[
            ParamSpec { name: "num_holes", min: 1.0, max: 16.0, default: 4.0 },
            ParamSpec { name: "hole_size", min: 1.0, max: 256.0, default: 32.0 },
        ],
        TransformKind::RandomZoom => &[ParamSpec { name: "factor", min: 0.5, max: 2.0, default: 1.2 }],
        TransformKind::AffineTransform => &[
            ParamSpec { name: "scale", min: 0.5, max: 2.0, default: 1.0 },
            ParamSpec { name: "rotation", min: -45.0, max: 45.0, default: 0.0 },
            ParamSpec { name: "shift_x", min: -0.25, max: 0.25, default: 0.0 },
            ParamSpec { name: "shift_y", min: -0.25, max: 0.25, default: 0.0 },
            ParamSpec { name: "shear_x", min: -30.0, max: 30.0, default: 0.0 },
            ParamSpec { name: "shear_y", min: -30.0, max: 30.0, default: 0.0 },
        ],
        TransformKind::PerspectiveWarp => &[ParamSpec { name: "distortion", min: 0.0, max: 0.3, default: 0.1 }],
        TransformKind::Grayscale => &[],
        TransformKind::Shear => &[ParamSpec { name: "angle", min: -45.0, max: 45.0, default: 10.0 }],
        TransformKind::GammaCorrection => &[ParamSpec { name: "gamma", min: 0.5, max: 2.0, default: 1.0 }],
        TransformKind::Equalize => &[],
        TransformKind::Clahe => &[
            ParamSpec { name: "clip_limit", min: 1.0, max: 8.0, default: 2.0 },
            ParamSpec { name: "tile_grid", min: 2.0, max: 16.0, default: 8.0 },
        ],
    }
}

/// Enumerated parameter declarations for a transform kind.
pub fn enum_param_specs(kind: TransformKind) -> &'static [EnumParamSpec] {
    match kind {
        TransformKind::Flip => &[EnumParamSpec {
            name: "axis",
            choices: &["horizontal", "vertical"],
            default: "horizontal",
        }],
        TransformKind::Resize => &[EnumParamSpec {
            name: "interpolation",
            choices: &["nearest", "linear", "cubic"],
            default: "linear",
        }],
        _ => &[],
    }
}

fn numeric_spec(kind: TransformKind, name: &str) -> Option<&'static ParamSpec> {
    param_specs(kind).iter().find(|s| s.name == name)
}

fn enum_spec(kind: TransformKind, name: &str) -> Option<&'static EnumParamSpec> {
    enum_param_specs(kind).iter().find(|s| s.name == name)
}

/// Validates a parameter map against the schema for `kind`.
///
/// Unknown keys are rejected; numeric values (and both ends of `{min, max}`
/// ranges) must lie within the declared range; ranges must be ordered.
pub fn validate_parameters(
    kind: TransformKind,
    params: &serde_json::Map<String, serde_json::Value>,
    path_prefix: &str,
) -> ValidationResult {
    let mut result = ValidationResult::new();

    for (key, value) in params {
        let path = format!("{}.{}", path_prefix, key);

        if let Some(spec) = enum_spec(kind, key) {
            match value.as_str() {
                Some(s) if spec.choices.contains(&s) => {}
                Some(s) => result.add_error(ValidationError::with_path(
                    ErrorCode::ParameterOutOfRange,
                    format!("'{}' is not one of {:?}", s, spec.choices),
                    path.clone(),
                )),
                None => result.add_error(ValidationError::with_path(
                    ErrorCode::InvalidParameter,
                    format!("'{}' must be a string", key),
                    path.clone(),
                )),
            }
            continue;
        }

        let Some(spec) = numeric_spec(kind, key) else {
            result.add_error(ValidationError::with_path(
                ErrorCode::UnknownParameter,
                format!("unknown parameter '{}' for {}", key, kind),
                path.clone(),
            ));
            continue;
        };

        match value {
            serde_json::Value::Number(n) => {
                let v = n.as_f64().unwrap_or(f64::NAN);
                if !(spec.min..=spec.max).contains(&v) {
                    result.add_error(ValidationError::with_path(
                        ErrorCode::ParameterOutOfRange,
                        format!("{} {} outside [{}, {}]", key, v, spec.min, spec.max),
                        path.clone(),
                    ));
                }
            }
            serde_json::Value::Object(obj) => {
                let min = obj.get("min").and_then(|v| v.as_f64());
                let max = obj.get("max").and_then(|v| v.as_f64());
                match (min, max) {
                    (Some(lo), Some(hi)) => {
                        if lo > hi {
                            result.add_error(ValidationError::with_path(
                                ErrorCode::InvalidParameterRange,
                                format!("{}: min {} > max {}", key, lo, hi),
                                path.clone(),
                            ));
                        } else if lo < spec.min || hi > spec.max {
                            result.add_error(ValidationError::with_path(
                                ErrorCode::InvalidParameterRange,
                                format!(
                                    "{} range [{}, {}] outside [{}, {}]",
                                    key, lo, hi, spec.min, spec.max
                                ),
                                path.clone(),
                            ));
                        }
                        if obj.keys().any(|k| k != "min" && k != "max") {
                            result.add_error(ValidationError::with_path(
                                ErrorCode::InvalidParameter,
                                format!("{}: range object allows only 'min' and 'max'", key),
                                path,
                            ));
                        }
                    }
                    _ => result.add_error(ValidationError::with_path(
                        ErrorCode::InvalidParameter,
                        format!("{}: range object needs numeric 'min' and 'max'", key),
                        path,
                    )),
                }
            }
            _ => result.add_error(ValidationError::with_path(
                ErrorCode::InvalidParameter,
                format!("{} must be a number or {{min, max}} range", key),
                path,
            )),
        }
    }

    result
}

/// Returns the declared default for a numeric parameter.
pub fn default_for(kind: TransformKind, name: &str) -> Option<f64> {
    numeric_spec(kind, name).map(|s| s.default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for kind in TransformKind::all() {
            let parsed: TransformKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
        assert!("sharpen".parse::<TransformKind>().is_err());
    }

    #[test]
    fn test_geometry_classification() {
        assert!(TransformKind::Rotate.affects_geometry());
        assert!(TransformKind::PerspectiveWarp.affects_geometry());
        assert!(!TransformKind::Brightness.affects_geometry());
        assert!(!TransformKind::Clahe.affects_geometry());
        // cutout erases pixels but never moves geometry
        assert!(!TransformKind::Cutout.affects_geometry());
    }

    #[test]
    fn test_validate_accepts_scalar_in_range() {
        let result = validate_parameters(
            TransformKind::Rotate,
            &map(json!({"angle": 30.0})),
            "parameters",
        );
        assert!(result.is_ok(), "{:?}", result.errors);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let result = validate_parameters(
            TransformKind::Rotate,
            &map(json!({"angle": 300.0})),
            "parameters",
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::ParameterOutOfRange);
    }

    #[test]
    fn test_validate_rejects_unknown_key() {
        let result = validate_parameters(
            TransformKind::Blur,
            &map(json!({"sigma": 2.0})),
            "parameters",
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::UnknownParameter);
    }

    #[test]
    fn test_validate_range_parameter() {
        let ok = validate_parameters(
            TransformKind::Rotate,
            &map(json!({"angle": {"min": -30, "max": 30}})),
            "parameters",
        );
        assert!(ok.is_ok(), "{:?}", ok.errors);

        let inverted = validate_parameters(
            TransformKind::Rotate,
            &map(json!({"angle": {"min": 30, "max": -30}})),
            "parameters",
        );
        assert_eq!(inverted.errors[0].code, ErrorCode::InvalidParameterRange);

        let too_wide = validate_parameters(
            TransformKind::Rotate,
            &map(json!({"angle": {"min": -30, "max": 400}})),
            "parameters",
        );
        assert_eq!(too_wide.errors[0].code, ErrorCode::InvalidParameterRange);
    }

    #[test]
    fn test_validate_enum_parameter() {
        let ok = validate_parameters(
            TransformKind::Flip,
            &map(json!({"axis": "vertical"})),
            "parameters",
        );
        assert!(ok.is_ok());

        let bad = validate_parameters(
            TransformKind::Flip,
            &map(json!({"axis": "diagonal"})),
            "parameters",
        );
        assert_eq!(bad.errors[0].code, ErrorCode::ParameterOutOfRange);
    }

    #[test]
    fn test_defaults_exist_for_declared_params() {
        assert_eq!(default_for(TransformKind::RandomZoom, "factor"), Some(1.2));
        assert_eq!(default_for(TransformKind::RandomZoom, "zoom"), None);
    }
}
