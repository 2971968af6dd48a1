//! Augmentation planner.
//!
//! Expands the enabled transformation records into concrete per-image
//! configurations: every range parameter is resolved to a value and every
//! step carries its own derived seed, so the engine downstream is pure and
//! reruns are reproducible regardless of worker count.

use std::collections::BTreeMap;

use thiserror::Error;

use labelforge_core::{
    derive_config_seed, derive_step_seed, param_specs, ImageRecord, SamplingStrategy,
    SplitSection, TransformKind, TransformStatus, TransformationRecord,
};

use crate::rng::DeterministicRng;

/// Upper bound on enumerated transform combinations per image.
const MAX_COMBINATIONS: usize = 10_000;

/// Combination size cap for the intelligent and random strategies.
const MAX_COMBO_SIZE: usize = 3;

/// Planner failure modes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// The multiplier asks for augmentations but no transforms are enabled.
    #[error("no enabled transformations available while images_per_original > 1")]
    NoTransformsAvailable,
}

/// One resolved transform step inside a configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStep {
    /// Id of the transformation record this step came from.
    pub transform_id: String,
    pub kind: TransformKind,
    /// Resolved numeric parameters (range parameters collapsed to a value).
    pub params: BTreeMap<String, f64>,
    /// Resolved enumerated parameters (e.g. flip axis).
    pub options: BTreeMap<String, String>,
    /// Derived seed for stochastic pixel work inside this step.
    pub step_seed: u64,
}

/// The concrete per-image plan: an ordered list of resolved transforms.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentationConfig {
    /// Short id unique within the source image (the config index).
    pub config_id: String,
    pub source_image_id: String,
    pub config_index: u32,
    pub target_split: SplitSection,
    /// Steps in `order_index` order; the engine must honor this order.
    pub steps: Vec<ResolvedStep>,
}

impl AugmentationConfig {
    /// Names of the applied transform kinds, in order.
    pub fn transform_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.kind.to_string()).collect()
    }
}

/// Expands enabled transforms into per-image augmentation configs.
pub struct Planner {
    enabled: Vec<TransformationRecord>,
    multiplier: u32,
    include_original: bool,
    sampling: SamplingStrategy,
    seed: u64,
}

impl Planner {
    /// Creates a planner over the enabled PENDING records.
    ///
    /// Records are filtered to `is_enabled` + `PENDING` and sorted by
    /// `order_index`; that order is the application contract.
    pub fn new(
        records: &[TransformationRecord],
        multiplier: u32,
        include_original: bool,
        sampling: SamplingStrategy,
        seed: u64,
    ) -> Self {
        let mut enabled: Vec<TransformationRecord> = records
            .iter()
            .filter(|r| r.is_enabled && r.status == TransformStatus::Pending)
            .cloned()
            .collect();
        enabled.sort_by_key(|r| r.order_index);
        Self {
            enabled,
            multiplier,
            include_original,
            sampling,
            seed,
        }
    }

    /// Ids of the records this planner consumes.
    pub fn consumed_transform_ids(&self) -> Vec<String> {
        self.enabled.iter().map(|r| r.id.clone()).collect()
    }

    /// Number of augmented outputs per source image.
    pub fn augmentations_per_image(&self) -> u32 {
        self.multiplier
            .saturating_sub(if self.include_original { 1 } else { 0 })
    }

    /// Plans configs for every image, in image order.
    pub fn plan(&self, images: &[ImageRecord]) -> Result<Vec<AugmentationConfig>, PlanError> {
        let mut configs = Vec::new();
        for image in images {
            configs.extend(self.plan_for_image(image)?);
        }
        Ok(configs)
    }

    /// Plans the configs for a single image.
    pub fn plan_for_image(
        &self,
        image: &ImageRecord,
    ) -> Result<Vec<AugmentationConfig>, PlanError> {
        let wanted = self.augmentations_per_image() as usize;
        if wanted == 0 {
            return Ok(Vec::new());
        }
        if self.enabled.is_empty() {
            return Err(PlanError::NoTransformsAvailable);
        }

        let combos = self.select_combinations(image, wanted);

        let mut configs = Vec::with_capacity(combos.len());
        for (index, combo) in combos.into_iter().enumerate() {
            let config_index = index as u32;
            let config_seed = derive_config_seed(self.seed, &image.id, config_index);
            let steps = combo
                .iter()
                .map(|&i| resolve_step(&self.enabled[i], config_seed))
                .collect();
            configs.push(AugmentationConfig {
                config_id: config_index.to_string(),
                source_image_id: image.id.clone(),
                config_index,
                target_split: image.split_section,
                steps,
            });
        }
        Ok(configs)
    }

    fn select_combinations(&self, image: &ImageRecord, wanted: usize) -> Vec<Vec<usize>> {
        let n = self.enabled.len();
        // Reserved index keeps the selection stream separate from any
        // per-config stream.
        let selection_seed = derive_config_seed(self.seed, &image.id, u32::MAX);
        let mut rng = DeterministicRng::new(selection_seed);

        match self.sampling {
            SamplingStrategy::Exhaustive => {
                let pool = enumerate_combinations(n, n, MAX_COMBINATIONS);
                (0..wanted).map(|i| pool[i % pool.len()].clone()).collect()
            }
            SamplingStrategy::Random => {
                let pool = enumerate_combinations(n, MAX_COMBO_SIZE.min(n), MAX_COMBINATIONS);
                (0..wanted)
                    .map(|_| pool[rng.gen_range(0..pool.len())].clone())
                    .collect()
            }
            SamplingStrategy::Intelligent => {
                let pool = enumerate_combinations(n, MAX_COMBO_SIZE.min(n), MAX_COMBINATIONS);
                let mut remaining: Vec<Vec<usize>> = pool.clone();
                let mut chosen = Vec::with_capacity(wanted);
                while chosen.len() < wanted {
                    if remaining.is_empty() {
                        // Pool exhausted: fall back to with-replacement draws
                        chosen.push(pool[rng.gen_range(0..pool.len())].clone());
                        continue;
                    }
                    // Heavier combinations carry more diversity
                    let weights: Vec<f64> =
                        remaining.iter().map(|c| c.len() as f64).collect();
                    let idx = rng.weighted_index(&weights);
                    chosen.push(remaining.swap_remove(idx));
                }
                chosen
            }
        }
    }
}

/// All index combinations of sizes 1..=max_size, ordered by size then
/// lexicographically, truncated at `limit`.
fn enumerate_combinations(n: usize, max_size: usize, limit: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    for size in 1..=max_size.min(n) {
        let mut combo: Vec<usize> = (0..size).collect();
        loop {
            out.push(combo.clone());
            if out.len() >= limit {
                return out;
            }
            // Advance to the next lexicographic combination
            let mut i = size;
            loop {
                if i == 0 {
                    break;
                }
                i -= 1;
                if combo[i] < n - (size - i) {
                    combo[i] += 1;
                    for j in i + 1..size {
                        combo[j] = combo[j - 1] + 1;
                    }
                    break;
                }
                if i == 0 {
                    combo.clear();
                    break;
                }
            }
            if combo.is_empty() {
                break;
            }
        }
    }
    out
}

/// Resolves one record into a step: range parameters collapse to concrete
/// values drawn from the step's own seed stream.
fn resolve_step(record: &TransformationRecord, config_seed: u64) -> ResolvedStep {
    let step_seed = derive_step_seed(config_seed, &record.id);
    let mut rng = DeterministicRng::new(step_seed);
    let kind = record.transformation_type;

    let mut params = BTreeMap::new();
    // Iterate the schema declaration, not the map, so range draws happen in
    // a fixed order.
    for spec in param_specs(kind) {
        let Some(value) = record.parameters.get(spec.name) else {
            continue;
        };
        match value {
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_f64() {
                    params.insert(spec.name.to_string(), v);
                }
            }
            serde_json::Value::Object(obj) => {
                let lo = obj.get("min").and_then(|v| v.as_f64()).unwrap_or(spec.min);
                let hi = obj.get("max").and_then(|v| v.as_f64()).unwrap_or(spec.max);
                params.insert(spec.name.to_string(), rng.uniform(lo, hi));
            }
            _ => {}
        }
    }

    let mut options = BTreeMap::new();
    for spec in labelforge_core::enum_param_specs(kind) {
        if let Some(v) = record.parameters.get(spec.name).and_then(|v| v.as_str()) {
            options.insert(spec.name.to_string(), v.to_string());
        }
    }

    ResolvedStep {
        transform_id: record.id.clone(),
        kind,
        params,
        options,
        step_seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image(id: &str) -> ImageRecord {
        ImageRecord {
            id: id.into(),
            dataset_id: "ds-1".into(),
            dataset_name: "street".into(),
            filename: format!("{id}.jpg"),
            file_path: format!("images/{id}.jpg"),
            width: 640,
            height: 480,
            split_section: SplitSection::Train,
            is_labeled: true,
        }
    }

    fn record(id: &str, kind: TransformKind, order: i32, params: serde_json::Value) -> TransformationRecord {
        TransformationRecord::pending(
            id,
            kind,
            params.as_object().cloned().unwrap_or_default(),
            order,
            "v1.0",
        )
    }

    fn sample_records() -> Vec<TransformationRecord> {
        vec![
            record("t-flip", TransformKind::Flip, 0, json!({"axis": "horizontal"})),
            record("t-rot", TransformKind::Rotate, 1, json!({"angle": {"min": -30, "max": 30}})),
            record("t-bright", TransformKind::Brightness, 2, json!({"percent": 20})),
        ]
    }

    #[test]
    fn test_enumerate_combinations_counts() {
        // C(3,1) + C(3,2) + C(3,3) = 7
        let combos = enumerate_combinations(3, 3, 1000);
        assert_eq!(combos.len(), 7);
        assert_eq!(combos[0], vec![0]);
        assert_eq!(combos[3], vec![0, 1]);
        assert_eq!(combos[6], vec![0, 1, 2]);
    }

    #[test]
    fn test_multiplier_one_with_original_plans_nothing() {
        let planner = Planner::new(
            &sample_records(),
            1,
            true,
            SamplingStrategy::Intelligent,
            42,
        );
        let configs = planner.plan_for_image(&image("img-1")).unwrap();
        assert!(configs.is_empty());
    }

    #[test]
    fn test_no_transforms_is_an_error() {
        let planner = Planner::new(&[], 3, true, SamplingStrategy::Intelligent, 42);
        assert_eq!(
            planner.plan_for_image(&image("img-1")).unwrap_err(),
            PlanError::NoTransformsAvailable
        );
    }

    #[test]
    fn test_disabled_records_are_ignored() {
        let mut records = sample_records();
        for r in &mut records {
            r.is_enabled = false;
        }
        let planner = Planner::new(&records, 2, true, SamplingStrategy::Intelligent, 42);
        assert!(planner.plan_for_image(&image("img-1")).is_err());
    }

    #[test]
    fn test_plan_count_honors_multiplier() {
        let planner = Planner::new(
            &sample_records(),
            4,
            true,
            SamplingStrategy::Intelligent,
            42,
        );
        let configs = planner.plan_for_image(&image("img-1")).unwrap();
        assert_eq!(configs.len(), 3);
        for (i, config) in configs.iter().enumerate() {
            assert_eq!(config.config_index, i as u32);
            assert!(!config.steps.is_empty());
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let records = sample_records();
        let a = Planner::new(&records, 5, true, SamplingStrategy::Intelligent, 42)
            .plan_for_image(&image("img-1"))
            .unwrap();
        let b = Planner::new(&records, 5, true, SamplingStrategy::Intelligent, 42)
            .plan_for_image(&image("img-1"))
            .unwrap();
        assert_eq!(a, b);

        let c = Planner::new(&records, 5, true, SamplingStrategy::Intelligent, 43)
            .plan_for_image(&image("img-1"))
            .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_steps_follow_order_index() {
        let mut records = sample_records();
        records.reverse(); // planner must restore order_index order
        let planner = Planner::new(&records, 8, true, SamplingStrategy::Exhaustive, 1);
        let configs = planner.plan_for_image(&image("img-1")).unwrap();
        for config in &configs {
            let orders: Vec<i32> = config
                .steps
                .iter()
                .map(|s| match s.kind {
                    TransformKind::Flip => 0,
                    TransformKind::Rotate => 1,
                    TransformKind::Brightness => 2,
                    _ => unreachable!(),
                })
                .collect();
            let mut sorted = orders.clone();
            sorted.sort();
            assert_eq!(orders, sorted);
        }
    }

    #[test]
    fn test_range_parameters_resolve_within_bounds() {
        let planner = Planner::new(&sample_records(), 6, true, SamplingStrategy::Random, 9);
        let configs = planner.plan_for_image(&image("img-1")).unwrap();
        for config in configs {
            for step in config.steps {
                if step.kind == TransformKind::Rotate {
                    let angle = step.params["angle"];
                    assert!((-30.0..=30.0).contains(&angle), "angle {}", angle);
                }
            }
        }
    }

    #[test]
    fn test_exhaustive_cycles_combinations() {
        let planner = Planner::new(&sample_records(), 9, true, SamplingStrategy::Exhaustive, 1);
        let configs = planner.plan_for_image(&image("img-1")).unwrap();
        assert_eq!(configs.len(), 8);
        // 7 combinations exist; the 8th wraps around to the first
        assert_eq!(configs[7].transform_names(), configs[0].transform_names());
    }

    #[test]
    fn test_different_images_draw_different_params() {
        let records = vec![record(
            "t-rot",
            TransformKind::Rotate,
            0,
            json!({"angle": {"min": -30, "max": 30}}),
        )];
        let planner = Planner::new(&records, 2, true, SamplingStrategy::Intelligent, 42);
        let a = planner.plan_for_image(&image("img-1")).unwrap();
        let b = planner.plan_for_image(&image("img-2")).unwrap();
        assert_ne!(a[0].steps[0].params["angle"], b[0].steps[0].params["angle"]);
    }
}
