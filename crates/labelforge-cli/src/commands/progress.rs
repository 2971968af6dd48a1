//! Progress command implementation.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::pipeline::ReleasePipeline;
use crate::store::MemoryStore;

/// Run the progress command against the recorded release state.
///
/// # Returns
/// Exit code: 0 found, 1 unknown release
pub fn run(project: &str, release_id: &str, json: bool) -> Result<ExitCode> {
    let store = MemoryStore::from_file(Path::new(project))
        .with_context(|| format!("cannot load project snapshot '{}'", project))?;
    let pipeline = ReleasePipeline::new(store, ".");

    let Some(progress) = pipeline.get_release_progress(release_id) else {
        eprintln!("{} unknown release '{}'", "error:".red(), release_id);
        return Ok(ExitCode::from(1));
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
    } else {
        println!("release: {}", progress.release_id);
        println!("status: {}", progress.status);
        println!("step: {}", progress.current_step);
        println!("progress: {:.1}%", progress.progress_percentage);
        println!(
            "images: {} processed / {} total, {} generated",
            progress.processed_images, progress.total_images, progress.generated_images
        );
        if let Some(error) = &progress.error_message {
            println!("error: {}", error);
        }
    }
    Ok(ExitCode::SUCCESS)
}
