//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use download_target::{ConflictAction, PromptResponse};

/// Decide the target of a download described by a JSON snapshot.
///
/// Prints the resulting target as JSON. Exits with status 2 when the
/// determination was interrupted.
#[derive(Parser, Debug)]
#[command(name = "download-target")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Preference file (defaults to the XDG config location)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// How location prompts are answered
    #[arg(long, value_enum, default_value_t = PromptArg::Continue)]
    pub prompt_response: PromptArg,

    /// Virtual path chosen by a previous attempt (resumption)
    #[arg(long, value_name = "PATH")]
    pub initial_path: Option<PathBuf>,

    /// Handling of an existing file at the target path
    #[arg(long, value_enum, default_value_t = ConflictArg::Uniquify)]
    pub conflict_action: ConflictArg,

    /// JSON file describing the download
    #[arg(value_name = "SNAPSHOT")]
    pub snapshot: PathBuf,
}

/// Prompt answers accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PromptArg {
    /// Accept without prompting
    Continue,
    /// Accept as if the user confirmed
    Confirm,
    /// Dismiss the prompt
    Cancel,
}

impl From<PromptArg> for PromptResponse {
    fn from(value: PromptArg) -> Self {
        match value {
            PromptArg::Continue => Self::Continue,
            PromptArg::Confirm => Self::Confirm,
            PromptArg::Cancel => Self::Cancel,
        }
    }
}

/// Conflict actions accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictArg {
    /// Replace the existing file
    Overwrite,
    /// Pick a free `name (N).ext`
    Uniquify,
    /// Ask the user
    Prompt,
}

impl From<ConflictArg> for ConflictAction {
    fn from(value: ConflictArg) -> Self {
        match value {
            ConflictArg::Overwrite => Self::Overwrite,
            ConflictArg::Uniquify => Self::Uniquify,
            ConflictArg::Prompt => Self::Prompt,
        }
    }
}
