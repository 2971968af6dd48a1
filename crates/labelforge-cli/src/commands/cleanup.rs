//! Cleanup command implementation.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::pipeline::ReleasePipeline;
use crate::store::MemoryStore;

/// Run the cleanup command; idempotent.
pub fn run(
    project: &str,
    release_id: &str,
    project_id: Option<&str>,
    project_root: &str,
) -> Result<ExitCode> {
    let store = MemoryStore::from_file(Path::new(project))
        .with_context(|| format!("cannot load project snapshot '{}'", project))?;
    let pipeline = ReleasePipeline::new(store, project_root);

    pipeline
        .cleanup_failed_release(release_id, project_id)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    pipeline
        .store()
        .save_to_file(Path::new(project))
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    println!("{} cleaned up release '{}'", "ok:".green(), release_id);
    Ok(ExitCode::SUCCESS)
}
