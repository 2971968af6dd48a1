//! History command implementation.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::pipeline::ReleasePipeline;
use crate::store::MemoryStore;

/// Run the history command.
pub fn run(project: &str, project_id: &str, limit: usize, json: bool) -> Result<ExitCode> {
    let store = MemoryStore::from_file(Path::new(project))
        .with_context(|| format!("cannot load project snapshot '{}'", project))?;
    let pipeline = ReleasePipeline::new(store, ".");

    let releases = pipeline
        .get_release_history(project_id, limit)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&releases)?);
        return Ok(ExitCode::SUCCESS);
    }

    if releases.is_empty() {
        println!("no releases for project '{}'", project_id);
        return Ok(ExitCode::SUCCESS);
    }
    for release in releases {
        println!(
            "{}  {}  {}  {} images  [{}]",
            release.created_at.format("%Y-%m-%d %H:%M"),
            release.id,
            release.name,
            release.final_image_count,
            release.status
        );
    }
    Ok(ExitCode::SUCCESS)
}
