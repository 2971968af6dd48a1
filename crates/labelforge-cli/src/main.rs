//! labelforge CLI - release generation for annotated datasets
//!
//! This binary drives the release pipeline against a project snapshot:
//! validate configurations, generate releases, inspect progress and
//! history, and clean up failed runs.

use clap::Parser;
use std::process::ExitCode;

use labelforge_cli::cli_args::{Cli, Commands};
use labelforge_cli::commands;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            project,
            config,
            release_version,
            project_root,
            workers,
            json,
        } => commands::generate::run(
            &project,
            &config,
            &release_version,
            &project_root,
            workers,
            json,
        ),
        Commands::Validate {
            config,
            project,
            json,
        } => commands::validate::run(&config, project.as_deref(), json),
        Commands::Progress {
            project,
            release_id,
            json,
        } => commands::progress::run(&project, &release_id, json),
        Commands::History {
            project,
            project_id,
            limit,
            json,
        } => commands::history::run(&project, &project_id, limit, json),
        Commands::Cleanup {
            project,
            release_id,
            project_id,
            project_root,
        } => commands::cleanup::run(
            &project,
            &release_id,
            project_id.as_deref(),
            &project_root,
        ),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
