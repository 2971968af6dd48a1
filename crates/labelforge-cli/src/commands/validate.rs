//! Validate command implementation.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;

use labelforge_core::{validate_parameters, ReleaseConfig, ValidationResult};

use crate::store::ProjectSnapshot;

/// Run the validate command.
///
/// Validates a release configuration, and when a project snapshot is
/// given, the parameters of every transformation record in it.
///
/// # Returns
/// Exit code: 0 valid, 1 invalid
pub fn run(config_path: &str, project: Option<&str>, json: bool) -> Result<ExitCode> {
    let config_text = std::fs::read_to_string(config_path)
        .with_context(|| format!("cannot read config '{}'", config_path))?;
    let config = ReleaseConfig::from_json(&config_text)
        .with_context(|| format!("cannot parse config '{}'", config_path))?;

    let mut result = config.validate();

    if let Some(project) = project {
        let snapshot = ProjectSnapshot::from_file(Path::new(project))
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        for (i, record) in snapshot.transforms.iter().enumerate() {
            result.merge(validate_parameters(
                record.transformation_type,
                &record.parameters,
                &format!("transforms[{}].parameters", i),
            ));
        }
    }

    report(&result, json);
    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn report(result: &ValidationResult, json: bool) {
    if json {
        let errors: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
        let warnings: Vec<String> = result.warnings.iter().map(|w| w.to_string()).collect();
        println!(
            "{}",
            serde_json::json!({
                "ok": result.is_ok(),
                "errors": errors,
                "warnings": warnings,
            })
        );
        return;
    }

    for e in &result.errors {
        eprintln!("{} {}", "error:".red(), e);
    }
    for w in &result.warnings {
        eprintln!("{} {}", "warning:".yellow(), w);
    }
    if result.is_ok() {
        println!("{} configuration is valid", "ok:".green());
    }
}
