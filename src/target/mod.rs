//! Download target determination.
//!
//! Given an in-flight download, a run decides the final path, whether the
//! user has to confirm it, how dangerous the file is, and which working name
//! to use while bytes arrive.
//!
//! # Architecture
//!
//! - [`TargetDeterminer`] - Step-by-step run driven on a tokio task
//! - [`TargetDelegate`] - Async trait the host implements to answer each step
//! - [`needs_confirmation`] - Whether the user must confirm the path
//! - [`danger_level`] - File-type danger adjusted by trust signals
//! - [`determine_intermediate_path`] - Working filename selection
//! - [`candidate_file_name`] - Default filename synthesis
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use download_target::target::{
//!     ConflictAction, DownloadPrefs, DownloadSnapshot, TargetDelegate, TargetDeterminer,
//! };
//!
//! # async fn example(delegate: Arc<dyn TargetDelegate>) -> Result<(), Box<dyn std::error::Error>> {
//! let url = url::Url::parse("https://example.com/report.pdf")?;
//! let prefs = Arc::new(DownloadPrefs::new("/home/me/Downloads"));
//! let result = TargetDeterminer::new(
//!     Arc::new(DownloadSnapshot::new(url)),
//!     None,
//!     ConflictAction::Uniquify,
//!     prefs,
//!     delegate,
//! )
//! .determine()
//! .await;
//! println!("target: {}", result.target_path.display());
//! # Ok(())
//! # }
//! ```

mod confirmation;
mod danger;
mod delegate;
mod determiner;
mod error;
mod file_types;
mod filename;
mod intermediate;
mod prefs;
mod snapshot;
mod state;
mod types;

pub use confirmation::{is_trusted_install_download, needs_confirmation};
pub use danger::{danger_level, visited_before};
pub use delegate::{
    Confirmation, ExtensionSuggestion, LocalPath, Reservation, TargetDelegate, VisitCount,
    VisitHistory,
};
pub use determiner::{CancelHandle, CancelSignal, TargetDeterminer, TargetResult};
pub use error::{DeterminationError, HistoryError};
pub use file_types::{FileTypePolicies, normalize_extension};
pub use filename::{
    candidate_file_name, extension_for_mime, generate_file_name, generate_safe_file_name,
    is_browser_renderable, mime_for_extension, normalize_suggested_path,
    parse_content_disposition, sanitize_filename,
};
pub use intermediate::{
    CRDOWNLOAD_SUFFIX, UNCONFIRMED_PREFIX, UNCONFIRMED_RANGE, crdownload_path,
    determine_intermediate_path, is_content_uri,
};
pub use prefs::{DEFAULT_DOWNLOAD_FILENAME, DownloadPrefs};
pub use snapshot::{DownloadSnapshot, EXTENSION_MIME_TYPE};
pub use state::{Step, WorkflowState};
pub use types::{
    ConfirmationReason, ConfirmationResult, ConflictAction, DangerLevel, DangerType,
    DownloadSource, DownloadState, InterruptReason, MixedContentStatus, PageTransition,
    PathValidationResult, TargetDisposition, TransitionType,
};
