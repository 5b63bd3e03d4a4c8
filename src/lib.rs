//! Download Target Library
//!
//! Decides where an in-flight download is written, whether the user has to
//! confirm the location first, how dangerous the file is considered and which
//! working filename to use while bytes are still arriving.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`target`] - Determination engine: policies, collaborator traits and the
//!   step-by-step run
//! - [`config`] - TOML preference file mapped onto [`target::DownloadPrefs`]
//! - [`local`] - Filesystem-backed collaborator used by the command line

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod local;
pub mod target;

// Re-export commonly used types
pub use config::{ConfigError, PrefsConfig, default_download_dir, load_config};
pub use local::{LocalDelegate, PromptResponse};
pub use target::{
    CancelHandle, ConflictAction, DownloadPrefs, DownloadSnapshot, InterruptReason,
    TargetDelegate, TargetDeterminer, TargetResult,
};
