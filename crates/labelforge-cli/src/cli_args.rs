//! Command-line argument definitions.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "labelforge",
    about = "Dataset release generation pipeline",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a release from a project snapshot
    Generate {
        /// Path to the project snapshot JSON (system of record)
        #[arg(long)]
        project: String,

        /// Path to the release configuration JSON
        #[arg(long)]
        config: String,

        /// Release version whose PENDING transforms are consumed
        #[arg(long)]
        release_version: String,

        /// Project root directory (staging and ZIP output land here)
        #[arg(long, default_value = ".")]
        project_root: String,

        /// Engine worker threads (defaults to a small pool)
        #[arg(long)]
        workers: Option<usize>,

        /// Emit machine-readable JSON instead of human output
        #[arg(long)]
        json: bool,
    },

    /// Validate a release configuration without running it
    Validate {
        /// Path to the release configuration JSON
        #[arg(long)]
        config: String,

        /// Optional project snapshot; also validates its transform records
        #[arg(long)]
        project: Option<String>,

        /// Emit machine-readable JSON instead of human output
        #[arg(long)]
        json: bool,
    },

    /// Show the recorded status of a release
    Progress {
        /// Path to the project snapshot JSON
        #[arg(long)]
        project: String,

        /// Release id
        #[arg(long)]
        release_id: String,

        /// Emit machine-readable JSON instead of human output
        #[arg(long)]
        json: bool,
    },

    /// List releases for a project, newest first
    History {
        /// Path to the project snapshot JSON
        #[arg(long)]
        project: String,

        /// Project id to list releases for
        #[arg(long)]
        project_id: String,

        /// Maximum number of releases to show
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Emit machine-readable JSON instead of human output
        #[arg(long)]
        json: bool,
    },

    /// Remove the artifacts of a failed release
    Cleanup {
        /// Path to the project snapshot JSON
        #[arg(long)]
        project: String,

        /// Release id to clean up
        #[arg(long)]
        release_id: String,

        /// Project id, for locating artifacts when the record is gone
        #[arg(long)]
        project_id: Option<String>,

        /// Project root directory
        #[arg(long, default_value = ".")]
        project_root: String,
    },
}
