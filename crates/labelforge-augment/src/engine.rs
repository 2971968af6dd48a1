//! Geometric augmentation engine.
//!
//! Applies a resolved configuration to one image: each geometric step
//! contributes a stage homography that reshapes the pixel canvas *and*
//! composes into the single homography later applied to the annotations, so
//! image and labels can never drift apart. Photometric steps adjust pixels
//! and contribute identity geometry.
//!
//! The engine is pure per call (modulo writing the output image): all
//! randomness comes from seeds carried inside the configuration.

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::RgbaImage;
use thiserror::Error;
use tracing::debug;

use labelforge_core::{
    default_for, Annotation, BoundingBox, ImageRecord, OutputImageFormat, Polygon, SplitSection,
    MIN_ANNOTATION_AREA,
};

use crate::clip::clip_ring_checked;
use crate::geometry::{envelope, Homography};
use crate::io::{self, ImageIoError};
use crate::planner::{AugmentationConfig, ResolvedStep};
use crate::rng::DeterministicRng;
use crate::{photometric, warp};

/// Engine failure modes. All of these fail a single config or image, never
/// the release.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("source image '{path}' not found")]
    SourceMissing { path: String },

    #[error("failed to decode '{path}': {reason}")]
    DecodeFailed { path: String, reason: String },

    #[error("transform '{kind}' failed: {reason}")]
    TransformFailed { kind: String, reason: String },

    #[error("transform '{kind}' produced an empty canvas")]
    EmptyCanvas { kind: String },

    #[error("engine deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Io(#[from] ImageIoError),
}

/// Everything the engine needs besides the configuration itself.
pub struct EngineInput<'a> {
    pub image: &'a ImageRecord,
    /// Staged path of the source file.
    pub source_path: &'a Path,
    pub annotations: &'a [Annotation],
    pub output_format: OutputImageFormat,
    /// Directory the output image is written into.
    pub output_dir: &'a Path,
    /// Soft deadline checked at stage boundaries.
    pub deadline: Option<Instant>,
}

/// Output of one engine invocation.
#[derive(Debug, Clone)]
pub struct AugmentationResult {
    pub source_image_id: String,
    pub dataset_id: String,
    pub dataset_name: String,
    pub config_id: String,
    pub split: SplitSection,
    pub file_name: String,
    pub augmented_image_path: PathBuf,
    pub augmented_width: u32,
    pub augmented_height: u32,
    /// Annotations in output-image pixel coordinates.
    pub updated_annotations: Vec<Annotation>,
    pub transformation_applied: Vec<String>,
    pub is_original: bool,
}

fn check_deadline(deadline: Option<Instant>) -> Result<(), EngineError> {
    match deadline {
        Some(d) if Instant::now() > d => Err(EngineError::DeadlineExceeded),
        _ => Ok(()),
    }
}

fn load_source(input: &EngineInput) -> Result<RgbaImage, EngineError> {
    io::load_rgba(input.source_path).map_err(|e| match e {
        ImageIoError::Missing { path } => EngineError::SourceMissing { path },
        ImageIoError::Decode { path, reason } => EngineError::DecodeFailed { path, reason },
        other => EngineError::Io(other),
    })
}

fn output_extension(input: &EngineInput) -> String {
    input
        .output_format
        .extension()
        .map(str::to_string)
        .unwrap_or_else(|| input.image.extension())
}

/// Applies one configuration to one image and writes the output file.
pub fn apply(
    input: &EngineInput,
    config: &AugmentationConfig,
) -> Result<AugmentationResult, EngineError> {
    check_deadline(input.deadline)?;
    let mut img = load_source(input)?;
    let mut h_total = Homography::identity();

    for step in &config.steps {
        check_deadline(input.deadline)?;
        if step.kind.affects_geometry() {
            let (next, h_stage) = apply_geometric_stage(img, step)?;
            if next.width() == 0 || next.height() == 0 {
                return Err(EngineError::EmptyCanvas {
                    kind: step.kind.to_string(),
                });
            }
            h_total = h_stage.compose(&h_total);
            img = next;
        } else {
            img = apply_photometric_stage(img, step);
        }
    }
    check_deadline(input.deadline)?;

    let (out_w, out_h) = img.dimensions();
    let updated_annotations =
        transform_annotations(input.annotations, &h_total, out_w as f64, out_h as f64);
    debug!(
        image = %input.image.id,
        config = %config.config_id,
        kept = updated_annotations.len(),
        dropped = input.annotations.len() - updated_annotations.len(),
        "annotations transformed"
    );

    let ext = output_extension(input);
    let file_name =
        io::augmented_file_name(&input.image.dataset_name, input.image.stem(), &config.config_id, &ext);
    let out_path = input.output_dir.join(&file_name);
    io::save_rgba(&img, &out_path, &ext)?;

    Ok(AugmentationResult {
        source_image_id: input.image.id.clone(),
        dataset_id: input.image.dataset_id.clone(),
        dataset_name: input.image.dataset_name.clone(),
        config_id: config.config_id.clone(),
        split: config.target_split,
        file_name,
        augmented_image_path: out_path,
        augmented_width: out_w,
        augmented_height: out_h,
        updated_annotations,
        transformation_applied: config.transform_names(),
        is_original: false,
    })
}

/// Emits the untransformed original in the configured output format.
pub fn emit_original(input: &EngineInput) -> Result<AugmentationResult, EngineError> {
    check_deadline(input.deadline)?;
    let img = load_source(input)?;
    let (w, h) = img.dimensions();

    let ext = output_extension(input);
    let file_name = io::original_file_name(&input.image.dataset_name, input.image.stem(), &ext);
    let out_path = input.output_dir.join(&file_name);
    io::save_rgba(&img, &out_path, &ext)?;

    Ok(AugmentationResult {
        source_image_id: input.image.id.clone(),
        dataset_id: input.image.dataset_id.clone(),
        dataset_name: input.image.dataset_name.clone(),
        config_id: "orig".to_string(),
        split: input.image.split_section,
        file_name,
        augmented_image_path: out_path,
        augmented_width: w,
        augmented_height: h,
        updated_annotations: input.annotations.to_vec(),
        transformation_applied: Vec::new(),
        is_original: true,
    })
}

/// Transforms annotations by the composed homography and clips them to the
/// output canvas, applying the degeneracy drop rules.
pub fn transform_annotations(
    annotations: &[Annotation],
    h: &Homography,
    out_w: f64,
    out_h: f64,
) -> Vec<Annotation> {
    let mut out = Vec::with_capacity(annotations.len());
    for ann in annotations {
        match ann {
            Annotation::Bbox(bbox) => {
                let corners = h.apply_ring(&bbox.corners());
                let (x_min, y_min, x_max, y_max) = envelope(&corners);
                let candidate = BoundingBox {
                    x_min,
                    y_min,
                    x_max,
                    y_max,
                    class_id: bbox.class_id,
                    class_name: bbox.class_name.clone(),
                    confidence: bbox.confidence,
                };
                if let Some(clipped) = candidate.clipped_to(out_w, out_h) {
                    out.push(Annotation::Bbox(clipped));
                }
            }
            Annotation::Polygon(poly) => {
                let ring = h.apply_ring(&poly.points);
                // A ring already inside the canvas keeps its exact vertices
                // and order; clipping would only churn them.
                let inside = ring
                    .iter()
                    .all(|&[x, y]| x >= 0.0 && x <= out_w && y >= 0.0 && y <= out_h);
                let kept = if inside {
                    (ring.len() >= 3 && labelforge_core::polygon_area(&ring) >= MIN_ANNOTATION_AREA)
                        .then_some(ring)
                } else {
                    clip_ring_checked(&ring, out_w, out_h, MIN_ANNOTATION_AREA)
                };
                if let Some(points) = kept {
                    out.push(Annotation::Polygon(Polygon {
                        points,
                        class_id: poly.class_id,
                        class_name: poly.class_name.clone(),
                        confidence: poly.confidence,
                    }));
                }
            }
        }
    }
    out
}

fn param(step: &ResolvedStep, name: &str) -> f64 {
    step.params
        .get(name)
        .copied()
        .or_else(|| default_for(step.kind, name))
        .unwrap_or(0.0)
}

fn option<'a>(step: &'a ResolvedStep, name: &str, default: &'a str) -> &'a str {
    step.options.get(name).map(String::as_str).unwrap_or(default)
}

/// Applies one geometric stage, returning the new canvas and the stage
/// homography.
///
/// Stage parameters are interpreted against the *current* canvas (rotation
/// about the current center, shifts as fractions of the current size), per
/// the stage-by-stage composition contract.
fn apply_geometric_stage(
    img: RgbaImage,
    step: &ResolvedStep,
) -> Result<(RgbaImage, Homography), EngineError> {
    use labelforge_core::TransformKind::*;

    let (w, h) = img.dimensions();
    let (wf, hf) = (w as f64, h as f64);

    match step.kind {
        Resize => {
            let (target_w, target_h) = resize_target(step, w, h);
            let out = warp::resize_with(&img, target_w, target_h, option(step, "interpolation", "linear"));
            let h_stage = Homography::scale(target_w as f64 / wf, target_h as f64 / hf);
            Ok((out, h_stage))
        }
        Flip => {
            if option(step, "axis", "horizontal") == "vertical" {
                Ok((warp::flip_vertical(&img), Homography::reflect_vertical(hf)))
            } else {
                Ok((warp::flip_horizontal(&img), Homography::reflect_horizontal(wf)))
            }
        }
        Rotate => {
            let angle = param(step, "angle");
            rotate_stage(img, angle)
        }
        Crop => {
            let bw = param(step, "width");
            let bh = param(step, "height");
            let (x0, y0, cw, ch) = if bw >= 1.0 && bh >= 1.0 {
                // Explicit box, clamped to the canvas
                let x0 = (param(step, "x") as u32).min(w.saturating_sub(1));
                let y0 = (param(step, "y") as u32).min(h.saturating_sub(1));
                (x0, y0, (bw as u32).min(w - x0), (bh as u32).min(h - y0))
            } else {
                // Center crop keeping the requested fraction per axis
                let f = param(step, "keep_fraction").clamp(0.5, 1.0);
                let cw = ((wf * f).round() as u32).max(1);
                let ch = ((hf * f).round() as u32).max(1);
                ((w - cw) / 2, (h - ch) / 2, cw, ch)
            };
            let out = warp::crop(&img, x0, y0, cw, ch);
            Ok((out, Homography::translate(-(x0 as f64), -(y0 as f64))))
        }
        Shear => {
            let t = param(step, "angle").to_radians().tan();
            let new_w = ((wf + t.abs() * hf).round() as u32).max(1);
            let tx = if t < 0.0 { t.abs() * hf } else { 0.0 };
            let h_stage = Homography::translate(tx, 0.0).compose(&Homography::shear_x(t));
            let out = warp_stage(&img, &h_stage, new_w, h, step)?;
            Ok((out, h_stage))
        }
        AffineTransform => {
            let scale = param(step, "scale");
            let rotation = param(step, "rotation");
            let shift_x = param(step, "shift_x") * wf;
            let shift_y = param(step, "shift_y") * hf;
            let shear_x = param(step, "shear_x").to_radians().tan();
            let shear_y = param(step, "shear_y").to_radians().tan();

            let center_in = Homography::translate(-wf / 2.0, -hf / 2.0);
            let linear = Homography::shear_x(shear_x)
                .compose(&Homography::shear_y(shear_y))
                .compose(&Homography::rotate_deg(rotation))
                .compose(&Homography::scale(scale, scale));
            let center_out = Homography::translate(wf / 2.0 + shift_x, hf / 2.0 + shift_y);
            let h_stage = center_out.compose(&linear).compose(&center_in);
            let out = warp_stage(&img, &h_stage, w, h, step)?;
            Ok((out, h_stage))
        }
        PerspectiveWarp => {
            let distortion = param(step, "distortion").clamp(0.0, 0.3);
            let mut rng = DeterministicRng::new(step.step_seed);
            // Eight inward displacements, drawn in a fixed corner order
            let d = |rng: &mut DeterministicRng, extent: f64| rng.gen_f64() * distortion * extent;
            let quad = [
                [d(&mut rng, wf), d(&mut rng, hf)],
                [wf - d(&mut rng, wf), d(&mut rng, hf)],
                [wf - d(&mut rng, wf), hf - d(&mut rng, hf)],
                [d(&mut rng, wf), hf - d(&mut rng, hf)],
            ];
            let h_stage = Homography::rect_to_quad(wf, hf, quad).ok_or_else(|| {
                EngineError::TransformFailed {
                    kind: step.kind.to_string(),
                    reason: "degenerate corner displacement".to_string(),
                }
            })?;
            let out = warp_stage(&img, &h_stage, w, h, step)?;
            Ok((out, h_stage))
        }
        RandomZoom => {
            let factor = param(step, "factor");
            let h_stage = Homography::translate(wf / 2.0, hf / 2.0)
                .compose(&Homography::scale(factor, factor))
                .compose(&Homography::translate(-wf / 2.0, -hf / 2.0));
            let out = warp_stage(&img, &h_stage, w, h, step)?;
            Ok((out, h_stage))
        }
        other => Err(EngineError::TransformFailed {
            kind: other.to_string(),
            reason: "not a geometric transform".to_string(),
        }),
    }
}

fn warp_stage(
    img: &RgbaImage,
    h_stage: &Homography,
    out_w: u32,
    out_h: u32,
    step: &ResolvedStep,
) -> Result<RgbaImage, EngineError> {
    warp::warp_bilinear(img, h_stage, out_w, out_h).ok_or_else(|| EngineError::TransformFailed {
        kind: step.kind.to_string(),
        reason: "singular stage homography".to_string(),
    })
}

fn resize_target(step: &ResolvedStep, w: u32, h: u32) -> (u32, u32) {
    if let Some(&ls) = step.params.get("longest_side") {
        let scale = ls / w.max(h) as f64;
        return (
            ((w as f64 * scale).round() as u32).max(1),
            ((h as f64 * scale).round() as u32).max(1),
        );
    }
    match (step.params.get("width"), step.params.get("height")) {
        (Some(&tw), Some(&th)) => (tw as u32, th as u32),
        (Some(&tw), None) => {
            let scale = tw / w as f64;
            (tw as u32, ((h as f64 * scale).round() as u32).max(1))
        }
        (None, Some(&th)) => {
            let scale = th / h as f64;
            (((w as f64 * scale).round() as u32).max(1), th as u32)
        }
        (None, None) => (
            default_for(step.kind, "width").unwrap_or(640.0) as u32,
            default_for(step.kind, "height").unwrap_or(640.0) as u32,
        ),
    }
}

/// Rotation stage: 90-degree multiples take an exact integer path; any
/// other angle expands the canvas to the rotated bounding rectangle and
/// resamples bilinearly.
fn rotate_stage(img: RgbaImage, angle: f64) -> Result<(RgbaImage, Homography), EngineError> {
    let (w, h) = img.dimensions();
    let (wf, hf) = (w as f64, h as f64);

    let quarters = angle / 90.0;
    if (quarters - quarters.round()).abs() < 1e-9 {
        let quarter = (quarters.round() as i64).rem_euclid(4) as u32;
        let out = warp::rotate_quarter(&img, quarter);
        let h_stage = match quarter {
            1 => Homography {
                m: [[0.0, -1.0, hf], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            },
            2 => Homography {
                m: [[-1.0, 0.0, wf], [0.0, -1.0, hf], [0.0, 0.0, 1.0]],
            },
            3 => Homography {
                m: [[0.0, 1.0, 0.0], [-1.0, 0.0, wf], [0.0, 0.0, 1.0]],
            },
            _ => Homography::identity(),
        };
        return Ok((out, h_stage));
    }

    let rad = angle.to_radians();
    let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
    let out_w = ((wf * cos + hf * sin).round() as u32).max(1);
    let out_h = ((wf * sin + hf * cos).round() as u32).max(1);

    let h_stage = Homography::translate(out_w as f64 / 2.0, out_h as f64 / 2.0)
        .compose(&Homography::rotate_deg(angle))
        .compose(&Homography::translate(-wf / 2.0, -hf / 2.0));

    let out = warp::warp_bilinear(&img, &h_stage, out_w, out_h).ok_or_else(|| {
        EngineError::TransformFailed {
            kind: "rotate".to_string(),
            reason: "singular rotation".to_string(),
        }
    })?;
    Ok((out, h_stage))
}

fn apply_photometric_stage(mut img: RgbaImage, step: &ResolvedStep) -> RgbaImage {
    use labelforge_core::TransformKind::*;

    match step.kind {
        Brightness => photometric::brightness(&mut img, param(step, "percent")),
        Contrast => photometric::contrast(&mut img, param(step, "percent")),
        Blur => return photometric::blur(&img, param(step, "radius")),
        Noise => {
            let mut rng = DeterministicRng::new(step.step_seed);
            photometric::noise(&mut img, param(step, "strength"), &mut rng);
        }
        ColorJitter => photometric::color_jitter(
            &mut img,
            param(step, "hue"),
            param(step, "saturation"),
            param(step, "brightness"),
            param(step, "contrast"),
        ),
        GammaCorrection => photometric::gamma_correction(&mut img, param(step, "gamma")),
        Grayscale => photometric::grayscale(&mut img),
        Equalize => photometric::equalize(&mut img),
        Clahe => photometric::clahe(
            &mut img,
            param(step, "clip_limit"),
            param(step, "tile_grid") as u32,
        ),
        Cutout => {
            let mut rng = DeterministicRng::new(step.step_seed);
            photometric::cutout(
                &mut img,
                param(step, "num_holes") as u32,
                param(step, "hole_size") as u32,
                &mut rng,
            );
        }
        // Geometric kinds never reach this path
        _ => {}
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::collections::BTreeMap;

    fn step(kind: labelforge_core::TransformKind, params: &[(&str, f64)]) -> ResolvedStep {
        ResolvedStep {
            transform_id: format!("t-{}", kind),
            kind,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            options: BTreeMap::new(),
            step_seed: 99,
        }
    }

    fn flip_step(axis: &str) -> ResolvedStep {
        let mut s = step(labelforge_core::TransformKind::Flip, &[]);
        s.options.insert("axis".into(), axis.into());
        s
    }

    fn image_record(w: u32, h: u32) -> ImageRecord {
        ImageRecord {
            id: "img-1".into(),
            dataset_id: "ds-1".into(),
            dataset_name: "street".into(),
            filename: "frame.png".into(),
            file_path: "frame.png".into(),
            width: w,
            height: h,
            split_section: SplitSection::Train,
            is_labeled: true,
        }
    }

    fn config(steps: Vec<ResolvedStep>) -> AugmentationConfig {
        AugmentationConfig {
            config_id: "0".into(),
            source_image_id: "img-1".into(),
            config_index: 0,
            target_split: SplitSection::Train,
            steps,
        }
    }

    fn write_test_image(dir: &Path, w: u32, h: u32) -> PathBuf {
        let img = RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 100, 255])
        });
        let path = dir.join("frame.png");
        io::save_rgba(&img, &path, "png").unwrap();
        path
    }

    fn run_in(
        dir: &tempfile::TempDir,
        w: u32,
        h: u32,
        annotations: Vec<Annotation>,
        steps: Vec<ResolvedStep>,
    ) -> AugmentationResult {
        let src = write_test_image(dir.path(), w, h);
        let record = image_record(w, h);
        let input = EngineInput {
            image: &record,
            source_path: &src,
            annotations: &annotations,
            output_format: OutputImageFormat::Png,
            output_dir: dir.path(),
            deadline: None,
        };
        apply(&input, &config(steps)).unwrap()
    }

    fn run(
        w: u32,
        h: u32,
        annotations: Vec<Annotation>,
        steps: Vec<ResolvedStep>,
    ) -> AugmentationResult {
        let dir = tempfile::tempdir().unwrap();
        run_in(&dir, w, h, annotations, steps)
    }

    #[test]
    fn test_horizontal_flip_maps_bbox() {
        let ann = Annotation::Bbox(BoundingBox::new(10.0, 20.0, 110.0, 80.0, 0, "car"));
        let result = run(400, 300, vec![ann], vec![flip_step("horizontal")]);

        assert_eq!((result.augmented_width, result.augmented_height), (400, 300));
        let Annotation::Bbox(b) = &result.updated_annotations[0] else {
            panic!("expected bbox");
        };
        // new.x_min = W - old.x_max, new.x_max = W - old.x_min, y preserved
        assert_eq!(b.x_min, 290.0);
        assert_eq!(b.x_max, 390.0);
        assert_eq!(b.y_min, 20.0);
        assert_eq!(b.y_max, 80.0);
    }

    #[test]
    fn test_horizontal_flip_maps_polygon() {
        let ann = Annotation::Polygon(Polygon::new(
            vec![[10.0, 10.0], [100.0, 10.0], [100.0, 80.0], [10.0, 80.0]],
            0,
            "sign",
        ));
        let result = run(400, 300, vec![ann], vec![flip_step("horizontal")]);
        let Annotation::Polygon(p) = &result.updated_annotations[0] else {
            panic!("expected polygon");
        };
        assert_eq!(
            p.points,
            vec![[390.0, 10.0], [300.0, 10.0], [300.0, 80.0], [390.0, 80.0]]
        );
    }

    #[test]
    fn test_rotate_90_exact_mapping() {
        let ann = Annotation::Bbox(BoundingBox::new(100.0, 50.0, 300.0, 250.0, 0, "car"));
        let result = run(
            640,
            480,
            vec![ann],
            vec![step(labelforge_core::TransformKind::Rotate, &[("angle", 90.0)])],
        );
        assert_eq!((result.augmented_width, result.augmented_height), (480, 640));
        let Annotation::Bbox(b) = &result.updated_annotations[0] else {
            panic!("expected bbox");
        };
        assert_eq!((b.x_min, b.y_min, b.x_max, b.y_max), (230.0, 100.0, 430.0, 300.0));
    }

    #[test]
    fn test_double_180_is_identity_on_annotations() {
        let original = BoundingBox::new(33.0, 44.0, 120.0, 200.0, 0, "car");
        let result = run(
            320,
            240,
            vec![Annotation::Bbox(original.clone())],
            vec![
                step(labelforge_core::TransformKind::Rotate, &[("angle", 180.0)]),
                step(labelforge_core::TransformKind::Rotate, &[("angle", 180.0)]),
            ],
        );
        let Annotation::Bbox(b) = &result.updated_annotations[0] else {
            panic!("expected bbox");
        };
        assert!((b.x_min - original.x_min).abs() <= 1.0);
        assert!((b.y_min - original.y_min).abs() <= 1.0);
        assert!((b.x_max - original.x_max).abs() <= 1.0);
        assert!((b.y_max - original.y_max).abs() <= 1.0);
    }

    #[test]
    fn test_photometric_only_preserves_geometry_exactly() {
        let bbox = BoundingBox::new(50.0, 60.0, 200.0, 180.0, 1, "person");
        let poly = Polygon::new(vec![[10.0, 10.0], [60.0, 15.0], [30.0, 70.0]], 2, "dog");
        let result = run(
            300,
            200,
            vec![Annotation::Bbox(bbox.clone()), Annotation::Polygon(poly.clone())],
            vec![
                step(labelforge_core::TransformKind::Brightness, &[("percent", 25.0)]),
                step(labelforge_core::TransformKind::Blur, &[("radius", 2.0)]),
            ],
        );
        assert_eq!(result.updated_annotations.len(), 2);
        assert_eq!(result.updated_annotations[0], Annotation::Bbox(bbox));
        assert_eq!(result.updated_annotations[1], Annotation::Polygon(poly));
    }

    #[test]
    fn test_resize_scales_annotations() {
        let ann = Annotation::Bbox(BoundingBox::new(50.0, 60.0, 200.0, 180.0, 0, "car"));
        let result = run(
            300,
            200,
            vec![ann],
            vec![step(
                labelforge_core::TransformKind::Resize,
                &[("width", 600.0), ("height", 100.0)],
            )],
        );
        assert_eq!((result.augmented_width, result.augmented_height), (600, 100));
        let Annotation::Bbox(b) = &result.updated_annotations[0] else {
            panic!("expected bbox");
        };
        assert_eq!((b.x_min, b.y_min, b.x_max, b.y_max), (100.0, 30.0, 400.0, 90.0));
    }

    #[test]
    fn test_center_crop_drops_outside_annotation() {
        // Box hugging the left edge disappears under a 50% center crop
        let edge = Annotation::Bbox(BoundingBox::new(0.0, 0.0, 20.0, 20.0, 0, "car"));
        let center = Annotation::Bbox(BoundingBox::new(140.0, 90.0, 180.0, 120.0, 0, "car"));
        let result = run(
            320,
            200,
            vec![edge, center],
            vec![step(labelforge_core::TransformKind::Crop, &[("keep_fraction", 0.5)])],
        );
        assert_eq!((result.augmented_width, result.augmented_height), (160, 100));
        assert_eq!(result.updated_annotations.len(), 1);
        let Annotation::Bbox(b) = &result.updated_annotations[0] else {
            panic!("expected bbox");
        };
        // Crop origin is (80, 50)
        assert_eq!((b.x_min, b.y_min, b.x_max, b.y_max), (60.0, 40.0, 100.0, 70.0));
    }

    #[test]
    fn test_zeroed_annotations_still_produce_image() {
        let dir = tempfile::tempdir().unwrap();
        let tiny = Annotation::Bbox(BoundingBox::new(0.0, 0.0, 4.0, 4.0, 0, "car"));
        let result = run_in(
            &dir,
            100,
            100,
            vec![tiny],
            vec![step(labelforge_core::TransformKind::Crop, &[("keep_fraction", 0.5)])],
        );
        assert!(result.updated_annotations.is_empty());
        assert!(result.augmented_image_path.exists());
    }

    #[test]
    fn test_rotate_30_expands_canvas() {
        let result = run(
            300,
            200,
            vec![],
            vec![step(labelforge_core::TransformKind::Rotate, &[("angle", 30.0)])],
        );
        let expected_w = (300.0 * 30f64.to_radians().cos() + 200.0 * 30f64.to_radians().sin())
            .round() as u32;
        let expected_h = (300.0 * 30f64.to_radians().sin() + 200.0 * 30f64.to_radians().cos())
            .round() as u32;
        assert_eq!(result.augmented_width, expected_w);
        assert_eq!(result.augmented_height, expected_h);
    }

    #[test]
    fn test_missing_source_is_classified() {
        let dir = tempfile::tempdir().unwrap();
        let record = image_record(100, 100);
        let input = EngineInput {
            image: &record,
            source_path: Path::new("/nonexistent/frame.png"),
            annotations: &[],
            output_format: OutputImageFormat::Png,
            output_dir: dir.path(),
            deadline: None,
        };
        let err = apply(&input, &config(vec![flip_step("horizontal")])).unwrap_err();
        assert!(matches!(err, EngineError::SourceMissing { .. }));
    }

    #[test]
    fn test_expired_deadline_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_image(dir.path(), 50, 50);
        let record = image_record(50, 50);
        let input = EngineInput {
            image: &record,
            source_path: &src,
            annotations: &[],
            output_format: OutputImageFormat::Png,
            output_dir: dir.path(),
            deadline: Some(Instant::now() - std::time::Duration::from_secs(1)),
        };
        let err = apply(&input, &config(vec![flip_step("horizontal")])).unwrap_err();
        assert!(matches!(err, EngineError::DeadlineExceeded));
    }

    #[test]
    fn test_emit_original_round_trips_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_image(dir.path(), 64, 48);
        let record = image_record(64, 48);
        let anns = vec![Annotation::Bbox(BoundingBox::new(1.0, 2.0, 30.0, 40.0, 0, "car"))];
        let input = EngineInput {
            image: &record,
            source_path: &src,
            annotations: &anns,
            output_format: OutputImageFormat::Png,
            output_dir: dir.path(),
            deadline: None,
        };
        let result = emit_original(&input).unwrap();
        assert!(result.is_original);
        assert_eq!(result.updated_annotations, anns);
        assert_eq!(result.file_name, "street_frame.png");
        assert!(result.transformation_applied.is_empty());
    }

    #[test]
    fn test_deterministic_given_same_config() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_image(dir.path(), 80, 60);
        let record = image_record(80, 60);
        let steps = vec![
            step(labelforge_core::TransformKind::Noise, &[("strength", 8.0)]),
            step(labelforge_core::TransformKind::Rotate, &[("angle", 17.0)]),
        ];

        let out_a = tempfile::tempdir().unwrap();
        let out_b = tempfile::tempdir().unwrap();
        for out in [&out_a, &out_b] {
            let input = EngineInput {
                image: &record,
                source_path: &src,
                annotations: &[],
                output_format: OutputImageFormat::Png,
                output_dir: out.path(),
                deadline: None,
            };
            apply(&input, &config(steps.clone())).unwrap();
        }
        let name = "street_frame__cfg0.png";
        let a = std::fs::read(out_a.path().join(name)).unwrap();
        let b = std::fs::read(out_b.path().join(name)).unwrap();
        assert_eq!(a, b);
    }
}
