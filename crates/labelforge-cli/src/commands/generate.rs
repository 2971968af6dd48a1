//! Generate command implementation.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;

use labelforge_core::{ReleaseConfig, ReleaseError, ReleaseStatus};

use crate::orchestrator::OrchestratorOptions;
use crate::pipeline::ReleasePipeline;
use crate::store::{MemoryStore, ReleaseStore};

/// Run the generate command.
///
/// Loads the project snapshot, drives the pipeline to a terminal state,
/// writes the updated snapshot back, and reports the outcome.
///
/// # Returns
/// Exit code: 0 success, 1 config/load error, 2 release failed
pub fn run(
    project: &str,
    config_path: &str,
    release_version: &str,
    project_root: &str,
    workers: Option<usize>,
    json: bool,
) -> Result<ExitCode> {
    let config_text = std::fs::read_to_string(config_path)
        .with_context(|| format!("cannot read config '{}'", config_path))?;
    let config = ReleaseConfig::from_json(&config_text)
        .with_context(|| format!("cannot parse config '{}'", config_path))?;

    let store = MemoryStore::from_file(Path::new(project))
        .with_context(|| format!("cannot load project snapshot '{}'", project))?;

    let mut options = OrchestratorOptions::default();
    if let Some(workers) = workers {
        options.workers = workers.max(1);
        options.max_in_flight = options.workers * 4;
    }
    let pipeline = ReleasePipeline::new(store, project_root).with_options(options);

    let release_id = match pipeline.generate_release(&config, release_version) {
        Ok(id) => id,
        Err(ReleaseError::InvalidConfig(_)) => {
            let result = config.validate();
            if json {
                let errors: Vec<String> =
                    result.errors.iter().map(|e| e.to_string()).collect();
                println!("{}", serde_json::json!({ "ok": false, "errors": errors }));
            } else {
                for e in &result.errors {
                    eprintln!("{} {}", "error:".red(), e);
                }
            }
            return Ok(ExitCode::from(1));
        }
        Err(e) => return Err(e.into()),
    };

    // Persist consumed transforms and the release record
    pipeline
        .store()
        .save_to_file(Path::new(project))
        .context("cannot write project snapshot back")?;

    let release = pipeline
        .store()
        .get_release(&release_id)
        .ok()
        .flatten()
        .context("release record missing after run")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&release)?);
    } else if release.status == ReleaseStatus::Completed {
        println!("{} release '{}' ({})", "ok:".green(), release.name, release.id);
        println!(
            "  images: {} total ({} original, {} augmented)",
            release.final_image_count,
            release.total_original_images,
            release.total_augmented_images
        );
        println!(
            "  splits: {} train / {} val / {} test, {} classes",
            release.train_image_count,
            release.val_image_count,
            release.test_image_count,
            release.class_count
        );
        println!("  format: {}", release.export_format);
        if let Some(path) = &release.model_path {
            println!("  zip: {}", path);
        }
    } else {
        eprintln!(
            "{} release '{}' failed: {}",
            "error:".red(),
            release.name,
            release.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(if release.status == ReleaseStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
