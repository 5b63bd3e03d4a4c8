//! Collaborators consulted during target determination.
//!
//! Each method answers one suspension point of the run. A reply is the
//! returned value; a run never has two requests outstanding at once.
//!
//! # Object Safety
//!
//! The traits use `async_trait` so runs can hold them as
//! `Arc<dyn TargetDelegate>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use super::error::HistoryError;
use super::snapshot::DownloadSnapshot;
use super::types::{
    ConfirmationReason, ConfirmationResult, ConflictAction, DangerType, MixedContentStatus,
    PathValidationResult,
};

/// Path and conflict handling proposed by extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSuggestion {
    /// Suggested path relative to the download directory; empty keeps the
    /// generated name.
    pub path: PathBuf,
    /// Requested conflict handling.
    pub conflict_action: ConflictAction,
}

/// Outcome of a path reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Validation verdict.
    pub result: PathValidationResult,
    /// Reserved path, possibly uniquified.
    pub path: PathBuf,
}

impl Reservation {
    /// Creates a reservation outcome.
    #[must_use]
    pub fn new(result: PathValidationResult, path: impl Into<PathBuf>) -> Self {
        Self {
            result,
            path: path.into(),
        }
    }
}

/// Outcome of a location prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// What the user did.
    pub result: ConfirmationResult,
    /// Path the user chose.
    pub path: PathBuf,
}

impl Confirmation {
    /// Creates a prompt outcome.
    #[must_use]
    pub fn new(result: ConfirmationResult, path: impl Into<PathBuf>) -> Self {
        Self {
            result,
            path: path.into(),
        }
    }
}

/// Local file backing a virtual path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPath {
    /// Real path; empty when mapping failed.
    pub path: PathBuf,
    /// Name to show the user when the path is not displayable itself.
    pub display_name: Option<String>,
}

impl LocalPath {
    /// Maps a virtual path onto itself.
    #[must_use]
    pub fn identity(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            display_name: None,
        }
    }
}

/// Visible visits to a referrer host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitCount {
    /// Number of visible visits.
    pub count: u64,
    /// Time of the earliest visible visit.
    pub first_visit: Option<DateTime<Utc>>,
}

/// Host services consulted by a determination run.
#[async_trait]
pub trait TargetDelegate: Send + Sync {
    /// Classifies the download as mixed content or not.
    async fn mixed_content_status(
        &self,
        download: &DownloadSnapshot,
        virtual_path: &Path,
    ) -> MixedContentStatus;

    /// Lets extensions rename the download.
    async fn notify_extensions(
        &self,
        download: &DownloadSnapshot,
        virtual_path: &Path,
    ) -> ExtensionSuggestion;

    /// Reserves `virtual_path` so concurrent downloads do not collide.
    async fn reserve_virtual_path(
        &self,
        download: &DownloadSnapshot,
        virtual_path: &Path,
        create_directory: bool,
        conflict_action: ConflictAction,
    ) -> Reservation;

    /// Asks the user to confirm or change the target path.
    async fn request_confirmation(
        &self,
        download: &DownloadSnapshot,
        virtual_path: &Path,
        reason: ConfirmationReason,
    ) -> Confirmation;

    /// Maps a virtual path to a local one.
    async fn determine_local_path(
        &self,
        download: &DownloadSnapshot,
        virtual_path: &Path,
    ) -> LocalPath;

    /// Sniffs the MIME type of a local file.
    async fn file_mime_type(&self, local_path: &Path) -> Option<String>;

    /// Returns true if a plugin can display `mime_type` safely.
    async fn is_handled_safely(&self, _local_path: &Path, _mime_type: &str) -> bool {
        false
    }

    /// Reputation check of the download URL.
    async fn check_download_url(
        &self,
        download: &DownloadSnapshot,
        virtual_path: &Path,
    ) -> DangerType;

    /// Visit history, when the host keeps one.
    fn visit_history(&self) -> Option<&dyn VisitHistory> {
        None
    }
}

/// Browsing history lookup.
#[async_trait]
pub trait VisitHistory: Send + Sync {
    /// Counts visible visits to the host of `url`.
    async fn visible_visit_count_to_host(&self, url: &Url) -> Result<VisitCount, HistoryError>;
}
