//! Release orchestrator.
//!
//! Drives the ten-step release protocol: resolve inputs, plan, stage, fan
//! the engine out over a worker pool, emit labels, package the ZIP, and
//! atomically consume the transformation records. Workers only compute and
//! write their own staged files; every store write and progress update goes
//! through the orchestrator thread.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use labelforge_augment::{
    engine, AugmentationConfig, AugmentationResult, EngineError, EngineInput, Planner,
};
use labelforge_core::{
    Annotation, ImageRecord, ProcessingStep, Release, ReleaseConfig, ReleaseError, ReleaseStatus,
    ReleaseWarning, SplitSection, TransformationRecord,
};
use labelforge_export::{
    build_snapshot, clean_staging, create_staging_skeleton, emit, image_dir, write_metadata,
    zip_directory, DatasetStats, ExportItem, ReleaseConfigDoc,
};

use crate::progress::ProgressTracker;
use crate::store::{ReleaseStore, StoreError};

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Engine worker threads.
    pub workers: usize,
    /// Soft per-config deadline, checked at stage boundaries.
    pub per_config_timeout: Duration,
    /// Bound on queued jobs; the planner side blocks when it is reached.
    pub max_in_flight: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(2);
        Self {
            workers,
            per_config_timeout: Duration::from_secs(60),
            max_in_flight: workers * 4,
        }
    }
}

/// Annotation lookup published under three keys per image: staged path,
/// source stem, and source image id. The id is the canonical key; the other
/// two exist for engines that index by path or stem.
#[derive(Default)]
pub struct AnnotationsMap {
    by_key: HashMap<String, Arc<Vec<Annotation>>>,
}

impl AnnotationsMap {
    pub fn insert(&mut self, image: &ImageRecord, staged_path: &Path, annotations: Vec<Annotation>) {
        let shared = Arc::new(annotations);
        self.by_key
            .insert(staged_path.display().to_string(), Arc::clone(&shared));
        self.by_key
            .insert(image.stem().to_string(), Arc::clone(&shared));
        self.by_key.insert(image.id.clone(), shared);
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<Annotation>>> {
        self.by_key.get(key).cloned()
    }
}

/// One unit of engine work: an augmentation config, or the original
/// pass-through when `config` is `None`.
struct Job {
    image: ImageRecord,
    staged_path: PathBuf,
    annotations: Arc<Vec<Annotation>>,
    config: Option<AugmentationConfig>,
}

struct JobOutcome {
    image_id: String,
    config_id: Option<String>,
    transform: Option<String>,
    result: Result<AugmentationResult, EngineError>,
}

/// Drives one release from config to packaged ZIP.
pub struct Orchestrator<'a, S: ReleaseStore> {
    store: &'a S,
    project_root: &'a Path,
    tracker: &'a ProgressTracker,
    options: OrchestratorOptions,
}

fn store_err(e: StoreError) -> ReleaseError {
    ReleaseError::Store(e.to_string())
}

impl<'a, S: ReleaseStore> Orchestrator<'a, S> {
    pub fn new(
        store: &'a S,
        project_root: &'a Path,
        tracker: &'a ProgressTracker,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            store,
            project_root,
            tracker,
            options,
        }
    }

    fn releases_dir(&self, project_id: &str) -> PathBuf {
        self.project_root
            .join("projects")
            .join(project_id)
            .join("releases")
    }

    fn release_dir(&self, project_id: &str, release_id: &str) -> PathBuf {
        self.releases_dir(project_id).join(release_id)
    }

    fn staging_root(&self, project_id: &str, release_id: &str) -> PathBuf {
        self.release_dir(project_id, release_id).join("staging")
    }

    /// Runs a release to a terminal state.
    ///
    /// Returns `Err` only for a rejected configuration or a failure to
    /// create the release record; any later failure is captured on the
    /// returned release (`status: failed`, `error_message` set).
    pub fn run(
        &self,
        config: &ReleaseConfig,
        release_version: &str,
    ) -> Result<Release, ReleaseError> {
        let validation = config.validate();
        if !validation.is_ok() {
            for e in &validation.errors {
                error!(%e, "release config rejected");
            }
            return Err(ReleaseError::InvalidConfig(validation.errors.len()));
        }
        for w in &validation.warnings {
            warn!(%w, "release config warning");
        }

        let mut release = Release::pending(config);
        self.store.create_release(&release).map_err(store_err)?;
        let cancel = self.tracker.register(&release.id);
        info!(release_id = %release.id, name = %release.name, "release created");

        release.status = ReleaseStatus::Processing;
        if let Err(e) = self.store.update_release(&release) {
            let err = store_err(e);
            self.fail(&mut release, &err, None);
            return Ok(release);
        }

        match self.execute(&mut release, config, release_version, &cancel) {
            Ok(()) => {
                self.tracker
                    .finish(&release.id, ReleaseStatus::Completed, None);
                info!(release_id = %release.id, "release completed");
                Ok(release)
            }
            Err(e) => {
                self.fail(&mut release, &e, None);
                Ok(release)
            }
        }
    }

    fn fail(&self, release: &mut Release, error: &ReleaseError, zip_path: Option<&Path>) {
        error!(release_id = %release.id, %error, "release failed");
        release.status = ReleaseStatus::Failed;
        release.error_message = Some(error.to_string());
        if let Err(e) = self.store.update_release(release) {
            warn!(release_id = %release.id, %e, "could not persist failed release");
        }
        if let Some(zip) = zip_path {
            let _ = fs::remove_file(zip);
        }
        let staging = self.staging_root(&release.project_id, &release.id);
        if let Err(e) = clean_staging(&staging) {
            warn!(release_id = %release.id, %e, "could not remove staging tree");
        }
        self.tracker
            .finish(&release.id, ReleaseStatus::Failed, Some(error.to_string()));
    }

    fn execute(
        &self,
        release: &mut Release,
        config: &ReleaseConfig,
        release_version: &str,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(), ReleaseError> {
        let release_id = release.id.clone();
        let mut warnings: Vec<ReleaseWarning> = Vec::new();

        // --- loading_data ---------------------------------------------------
        self.tracker.advance(&release_id, ProcessingStep::LoadingData);
        let splits = config.effective_splits();
        let images = self
            .store
            .labeled_images(&config.dataset_ids, &splits)
            .map_err(store_err)?;
        self.tracker.start(&release_id, images.len() as u64);
        if images.is_empty() {
            warn!(release_id = %release_id, "no labeled images match the release selection");
            warnings.push(ReleaseWarning::new(
                "loading_data",
                "no labeled images matched the dataset/split selection",
            ));
        }

        let transforms = self
            .store
            .pending_transforms(release_version)
            .map_err(store_err)?;
        if transforms.is_empty() && config.images_per_original > 1 {
            return Err(ReleaseError::NoTransformsAvailable {
                release_version: release_version.to_string(),
            });
        }

        let staging_root = self.staging_root(&config.project_id, &release_id);
        create_staging_skeleton(&staging_root)?;
        let sources_dir = staging_root.join("sources");
        fs::create_dir_all(&sources_dir)?;

        let (staged, ann_map) = self.stage_sources(&images, &sources_dir, &mut warnings)?;

        // --- generating_configurations --------------------------------------
        if cancel.load(Ordering::SeqCst) {
            return Err(ReleaseError::Cancelled);
        }
        self.tracker
            .advance(&release_id, ProcessingStep::GeneratingConfigurations);
        let planner = Planner::new(
            &transforms,
            config.images_per_original,
            config.include_original,
            config.sampling_strategy,
            config.effective_seed(),
        );

        let mut jobs: Vec<Job> = Vec::new();
        for (mut image, staged_path) in staged {
            if !config.preserve_original_splits {
                image.split_section = SplitSection::Train;
            }
            let annotations = ann_map.get(&image.id).unwrap_or_default();
            let configs = planner
                .plan_for_image(&image)
                .map_err(|_| ReleaseError::NoTransformsAvailable {
                    release_version: release_version.to_string(),
                })?;
            if config.include_original {
                jobs.push(Job {
                    image: image.clone(),
                    staged_path: staged_path.clone(),
                    annotations: Arc::clone(&annotations),
                    config: None,
                });
            }
            for plan in configs {
                jobs.push(Job {
                    image: image.clone(),
                    staged_path: staged_path.clone(),
                    annotations: Arc::clone(&annotations),
                    config: Some(plan),
                });
            }
        }
        info!(release_id = %release_id, jobs = jobs.len(), "configurations generated");

        // --- processing_images ----------------------------------------------
        self.tracker
            .advance(&release_id, ProcessingStep::ProcessingImages);
        let results = self.process_jobs(
            jobs,
            &staging_root,
            config,
            cancel,
            &release_id,
            &mut warnings,
        )?;

        // --- finalizing ------------------------------------------------------
        self.tracker.advance(&release_id, ProcessingStep::Finalizing);
        let mut items: Vec<ExportItem> = results
            .iter()
            .map(|r| ExportItem {
                image_id: Path::new(&r.file_name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(&r.file_name)
                    .to_string(),
                source_image_id: r.source_image_id.clone(),
                dataset_id: r.dataset_id.clone(),
                file_name: r.file_name.clone(),
                image_path: r.augmented_image_path.clone(),
                width: r.augmented_width,
                height: r.augmented_height,
                split: r.split,
                annotations: r.updated_annotations.clone(),
                is_original: r.is_original,
            })
            .collect();

        release.total_original_images = items.iter().filter(|i| i.is_original).count() as u64;
        release.total_augmented_images = items.iter().filter(|i| !i.is_original).count() as u64;
        release.final_image_count =
            release.total_original_images + release.total_augmented_images;
        release.train_image_count = items
            .iter()
            .filter(|i| i.split == SplitSection::Train)
            .count() as u64;
        release.val_image_count = items
            .iter()
            .filter(|i| i.split == SplitSection::Val)
            .count() as u64;
        release.test_image_count = items
            .iter()
            .filter(|i| i.split == SplitSection::Test)
            .count() as u64;

        let outcome = emit(
            &mut items,
            config.export_format,
            config.task_type,
            config.description.as_deref().unwrap_or(""),
            &staging_root,
        )
        .map_err(|e| ReleaseError::PackagingFailed(e.to_string()))?;
        release.export_format = outcome.format;
        release.class_count = outcome.classes.len() as u64;

        // --- creating_zip_package -------------------------------------------
        if cancel.load(Ordering::SeqCst) {
            return Err(ReleaseError::Cancelled);
        }
        self.tracker
            .advance(&release_id, ProcessingStep::CreatingZipPackage);

        let stats = DatasetStats::from_items(&items);
        let doc = ReleaseConfigDoc::new(
            release,
            outcome.classes.clone(),
            stats,
            transforms.clone(),
            warnings.clone(),
        );
        let snapshot = build_snapshot(&items, &outcome.classes);
        write_metadata(&staging_root, &doc, &snapshot)
            .map_err(|e| ReleaseError::PackagingFailed(e.to_string()))?;

        let zip_name = format!(
            "{}_{}.zip",
            release.name.replace(' ', "_"),
            outcome.format
        );
        let zip_path = self.releases_dir(&config.project_id).join(&zip_name);
        if let Err(e) = zip_directory(&staging_root, &zip_path) {
            let _ = fs::remove_file(&zip_path);
            return Err(ReleaseError::PackagingFailed(e.to_string()));
        }

        // --- atomic transform completion ------------------------------------
        // All-or-nothing: a partial update would orphan COMPLETED records, so
        // any failure removes the ZIP and fails the release.
        let consumed = planner.consumed_transform_ids();
        if !consumed.is_empty() {
            if let Err(e) = self.store.complete_transforms(&consumed, &release_id) {
                let _ = fs::remove_file(&zip_path);
                return Err(ReleaseError::TransactionFailed(e.to_string()));
            }
        }

        release.model_path = Some(
            PathBuf::from("projects")
                .join(&config.project_id)
                .join("releases")
                .join(&zip_name)
                .display()
                .to_string(),
        );
        release.status = ReleaseStatus::Completed;
        self.store.update_release(release).map_err(store_err)?;

        clean_staging(&staging_root)?;
        Ok(())
    }

    /// Copies source files into staging, validates annotations, and builds
    /// the triple-keyed annotations map. Missing files are recorded and
    /// skipped.
    #[allow(clippy::type_complexity)]
    fn stage_sources(
        &self,
        images: &[ImageRecord],
        sources_dir: &Path,
        warnings: &mut Vec<ReleaseWarning>,
    ) -> Result<(Vec<(ImageRecord, PathBuf)>, AnnotationsMap), ReleaseError> {
        let mut staged = Vec::with_capacity(images.len());
        let mut ann_map = AnnotationsMap::default();

        for image in images {
            let source = {
                let p = Path::new(&image.file_path);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    self.project_root.join(p)
                }
            };
            if !source.exists() {
                warn!(image_id = %image.id, path = %source.display(), "source image missing");
                warnings.push(
                    ReleaseWarning::new("loading_data", "source image file not found")
                        .with_image(&image.id),
                );
                continue;
            }

            let staged_path = sources_dir.join(format!("{}.{}", image.id, image.extension()));
            fs::copy(&source, &staged_path)?;

            let raw = self
                .store
                .annotations_for_image(&image.id)
                .map_err(store_err)?;
            let (w, h) = (image.width as f64, image.height as f64);
            let mut kept = Vec::with_capacity(raw.len());
            for ann in raw {
                if ann.is_valid_for(w, h) {
                    kept.push(ann);
                } else {
                    warnings.push(
                        ReleaseWarning::new("loading_data", "annotation outside image bounds")
                            .with_image(&image.id),
                    );
                }
            }

            ann_map.insert(image, &staged_path, kept);
            staged.push((image.clone(), staged_path));
        }

        Ok((staged, ann_map))
    }

    /// Fans the jobs out over the worker pool.
    ///
    /// The feed side blocks on the bounded job channel (backpressure); the
    /// orchestrator thread drains results and serializes progress updates.
    fn process_jobs(
        &self,
        jobs: Vec<Job>,
        staging_root: &Path,
        config: &ReleaseConfig,
        cancel: &Arc<AtomicBool>,
        release_id: &str,
        warnings: &mut Vec<ReleaseWarning>,
    ) -> Result<Vec<AugmentationResult>, ReleaseError> {
        let mut remaining_per_image: HashMap<String, usize> = HashMap::new();
        for job in &jobs {
            *remaining_per_image.entry(job.image.id.clone()).or_default() += 1;
        }

        let workers = self.options.workers.max(1);
        let (job_tx, job_rx) = crossbeam_channel::bounded::<Job>(self.options.max_in_flight.max(1));
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<JobOutcome>();
        let timeout = self.options.per_config_timeout;
        let output_format = config.output_format;

        let mut results = Vec::new();
        let mut processed_images = 0u64;
        let mut generated_images = 0u64;

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let cancel = Arc::clone(cancel);
                scope.spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        // Cancellation is honored at the job boundary; the
                        // job in flight always finishes.
                        if cancel.load(Ordering::SeqCst) {
                            continue;
                        }
                        let outcome = run_job(&job, staging_root, output_format, timeout);
                        if result_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(result_tx);

            let feeder_cancel = Arc::clone(cancel);
            scope.spawn(move || {
                for job in jobs {
                    if feeder_cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            });

            for outcome in result_rx.iter() {
                match outcome.result {
                    Ok(result) => {
                        generated_images += 1;
                        results.push(result);
                    }
                    Err(err) => {
                        warn!(
                            release_id = %release_id,
                            image_id = %outcome.image_id,
                            %err,
                            "engine job skipped"
                        );
                        let mut warning =
                            ReleaseWarning::new("processing_images", err.to_string())
                                .with_image(&outcome.image_id);
                        if let Some(config_id) = &outcome.config_id {
                            warning = warning.with_config(config_id);
                        }
                        if let Some(transform) = &outcome.transform {
                            warning = warning.with_transform(transform);
                        }
                        warnings.push(warning);
                    }
                }

                if let Some(left) = remaining_per_image.get_mut(&outcome.image_id) {
                    *left -= 1;
                    if *left == 0 {
                        processed_images += 1;
                    }
                }
                self.tracker.update(release_id, |p| {
                    p.record_processed(processed_images, generated_images)
                });
            }
        });

        if cancel.load(Ordering::SeqCst) {
            return Err(ReleaseError::Cancelled);
        }
        Ok(results)
    }
}

fn run_job(
    job: &Job,
    staging_root: &Path,
    output_format: labelforge_core::OutputImageFormat,
    timeout: Duration,
) -> JobOutcome {
    let split = job
        .config
        .as_ref()
        .map(|c| c.target_split)
        .unwrap_or(job.image.split_section);
    let out_dir = image_dir(staging_root, split);

    let input = EngineInput {
        image: &job.image,
        source_path: &job.staged_path,
        annotations: &job.annotations,
        output_format,
        output_dir: &out_dir,
        deadline: Some(Instant::now() + timeout),
    };

    let result = match &job.config {
        Some(plan) => engine::apply(&input, plan),
        None => engine::emit_original(&input),
    };

    JobOutcome {
        image_id: job.image.id.clone(),
        config_id: job.config.as_ref().map(|c| c.config_id.clone()),
        transform: job
            .config
            .as_ref()
            .and_then(|c| c.steps.first().map(|s| s.kind.to_string())),
        result,
    }
}

/// Transforms consumed by a release, for display purposes.
pub fn transform_summary(transforms: &[TransformationRecord]) -> String {
    transforms
        .iter()
        .map(|t| t.transformation_type.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
