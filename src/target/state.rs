//! Mutable state of a single determination run.

use std::path::PathBuf;

use super::snapshot::DownloadSnapshot;
use super::types::{
    ConfirmationReason, ConflictAction, DangerLevel, DangerType, MixedContentStatus,
    TargetDisposition,
};

/// Steps of target determination, in their fixed forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Derive the initial virtual path.
    GeneratePath,
    /// Ask whether the download is mixed content.
    SetMixedContentStatus,
    /// Let extensions rename the download.
    NotifyExtensions,
    /// Reserve the virtual path against concurrent downloads.
    ReserveVirtualPath,
    /// Ask the user to confirm the path.
    RequestConfirmation,
    /// Map the virtual path to a local path.
    DetermineLocalPath,
    /// Sniff the MIME type from the local path.
    DetermineMimeType,
    /// Check whether the browser can render the file type safely.
    DetermineIfHandledSafely,
    /// Reputation check of the download URL.
    CheckDownloadUrl,
    /// Refine the danger level with the referrer's visit history.
    CheckVisitedReferrerBefore,
    /// Pick the working filename and finish.
    DetermineIntermediatePath,
    /// The run finished with a target.
    Complete,
    /// The run stopped early.
    Cancelled,
}

impl Step {
    /// Returns true once no further step runs.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }
}

/// Decisions accumulated step by step, exclusively owned by one run.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// The step that runs next.
    pub next_step: Step,
    /// The previous attempt failed and left a virtual path behind.
    pub is_resumption: bool,
    /// Path as seen by the download subsystem.
    pub virtual_path: PathBuf,
    /// Real filesystem path backing `virtual_path`.
    pub local_path: PathBuf,
    /// Working filename while bytes are arriving.
    pub intermediate_path: PathBuf,
    /// MIME type sniffed from the local file, if any.
    pub mime_type: Option<String>,
    /// Current danger verdict.
    pub danger_type: DangerType,
    /// Policy-adjusted danger level.
    pub danger_level: DangerLevel,
    /// Mixed-content classification.
    pub mixed_content_status: MixedContentStatus,
    /// Why the user must confirm the path.
    pub confirmation_reason: ConfirmationReason,
    /// Conflict handling for path reservation.
    pub conflict_action: ConflictAction,
    /// The browser renders the file type without plugins or sandboxed ones.
    pub is_filetype_handled_safely: bool,
    /// The generated path may still be renamed by extensions.
    pub should_notify_extensions: bool,
    /// Reservation must create missing directories.
    pub create_target_directory: bool,
    /// A dialog-confirmed path is being validated again.
    pub is_checking_dialog_confirmed_path: bool,
}

impl WorkflowState {
    /// Creates the state for a new run.
    #[must_use]
    pub fn new(
        download: &DownloadSnapshot,
        initial_virtual_path: Option<PathBuf>,
        conflict_action: ConflictAction,
    ) -> Self {
        let virtual_path = initial_virtual_path.unwrap_or_default();
        let is_resumption = download.last_reason != super::types::InterruptReason::None
            && !virtual_path.as_os_str().is_empty();
        Self {
            next_step: Step::GeneratePath,
            is_resumption,
            virtual_path,
            local_path: PathBuf::new(),
            intermediate_path: PathBuf::new(),
            mime_type: None,
            danger_type: download.danger_type,
            danger_level: DangerLevel::NotDangerous,
            mixed_content_status: MixedContentStatus::Unknown,
            confirmation_reason: ConfirmationReason::None,
            conflict_action,
            is_filetype_handled_safely: false,
            should_notify_extensions: false,
            create_target_directory: false,
            is_checking_dialog_confirmed_path: false,
        }
    }

    /// Returns true if the user chose this path on a previous attempt.
    #[must_use]
    pub fn has_prompted_for_path(&self, download: &DownloadSnapshot) -> bool {
        self.is_resumption && download.target_disposition == TargetDisposition::Prompt
    }
}
