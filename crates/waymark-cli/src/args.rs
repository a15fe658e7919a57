//! Command-line argument definitions using clap's derive API.
//!
//! Arguments stay free of core types; [`crate::cli::Cli`] turns them into
//! engine configuration and calls.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Execute generated workspace plans with retries, consent prompts and
/// revertible change history.
///
/// A plan is a JSON document listing ordered steps (create a directory,
/// create or modify a file, run a shell command). Waymark applies the steps
/// to a project directory, asks before running commands, retries transient
/// failures and records every change so a run can be reverted later.
#[derive(Parser)]
#[command(version, about, name = "waymark")]
pub struct Args {
    /// Path to the SQLite history file. Defaults to
    /// $XDG_DATA_HOME/waymark/history.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Path to a JSON config file. Defaults to
    /// $XDG_CONFIG_HOME/waymark/config.json when it exists
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API key for the generation service; repeat to build a rotation pool.
    /// Keys in WAYMARK_API_KEYS (comma-separated) are appended.
    #[arg(long = "api-key", global = true)]
    pub api_keys: Vec<String>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a plan against a workspace
    Run(RunArgs),
    /// Parse and validate a plan without executing it
    Validate {
        /// Plan file, or `-` to read from stdin
        plan: PathBuf,
    },
    /// Inspect and revert recorded change sets
    #[command(alias = "h")]
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Run one prompt against many files concurrently
    Analyze(AnalyzeArgs),
}

#[derive(ClapArgs)]
pub struct RunArgs {
    /// Plan file, or `-` to read from stdin
    pub plan: PathBuf,

    /// Workspace root the plan's paths are relative to
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Run commands without asking for consent
    #[arg(short, long)]
    pub yes: bool,

    /// Cancel the run after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List recorded change sets, newest first
    #[command(alias = "ls")]
    List {
        /// Maximum number of change sets to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one change set with its diffs
    Show {
        /// Change set ID
        id: u64,
    },
    /// Undo the changes of one change set
    Revert {
        /// Change set ID
        id: u64,

        /// Workspace root; defaults to the root recorded with the change set
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[derive(ClapArgs)]
pub struct AnalyzeArgs {
    /// Files to analyse
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Instruction applied to every file
    #[arg(short, long)]
    pub prompt: String,

    /// Maximum number of concurrent requests; overrides the config
    #[arg(long)]
    pub workers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_repeated_api_keys() {
        let args = Args::parse_from([
            "waymark", "--api-key", "a", "--api-key", "b", "validate", "plan.json",
        ]);
        assert_eq!(args.api_keys, ["a", "b"]);
        assert!(matches!(args.command, Commands::Validate { .. }));
    }

    #[test]
    fn test_run_defaults() {
        let args = Args::parse_from(["waymark", "run", "-"]);
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.root, PathBuf::from("."));
        assert!(!run.yes);
        assert!(run.deadline_secs.is_none());
    }
}
