//! Closed vocabularies shared by the policies and the determination machine.
//!
//! Every decision point of target determination is one of these enums, so a
//! `match` over them is checked for exhaustiveness at compile time.

use serde::{Deserialize, Serialize};

/// Raw verdict on how dangerous a download is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerType {
    /// Nothing suspicious was found.
    #[default]
    NotDangerous,
    /// The file type is dangerous in this context.
    DangerousFile,
    /// The download URL is known to serve malware.
    DangerousUrl,
    /// The content is known to be malicious.
    DangerousContent,
    /// Content may be malicious; a scan was requested.
    MaybeDangerousContent,
    /// Content is uncommon and could not be classified.
    UncommonContent,
    /// The user explicitly accepted a dangerous download.
    UserValidated,
    /// The serving host is known to distribute malware.
    DangerousHost,
    /// The file is potentially unwanted software.
    PotentiallyUnwanted,
    /// An administrator allowlisted the download.
    AllowlistedByPolicy,
}

impl DangerType {
    /// Returns true when the danger level still depends on the file type
    /// (and therefore possibly on the referrer's visit history).
    #[must_use]
    pub fn depends_on_file_type(self) -> bool {
        matches!(
            self,
            Self::NotDangerous | Self::MaybeDangerousContent | Self::AllowlistedByPolicy
        )
    }
}

/// Policy-adjusted decision derived from the file type and trust signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerLevel {
    /// Safe to download without a warning.
    #[default]
    NotDangerous,
    /// Dangerous unless the download is explained by a user action.
    AllowOnUserGesture,
    /// Always dangerous.
    Dangerous,
}

/// Why the user must confirm the target path before the download proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationReason {
    /// No confirmation required.
    #[default]
    None,
    /// The download was an explicit "save as".
    SaveAs,
    /// The user asked to be prompted for every download.
    Preference,
    /// The target directory cannot be written.
    TargetPathNotWriteable,
    /// The target volume ran out of space on a previous attempt.
    TargetNoSpace,
    /// The generated name exceeds the filesystem limit.
    NameTooLong,
    /// A file already exists and cannot be uniquified.
    TargetConflict,
}

impl ConfirmationReason {
    /// Returns true for any reason other than [`ConfirmationReason::None`].
    #[must_use]
    pub fn is_required(self) -> bool {
        self != Self::None
    }
}

/// Outcome of asking the user to confirm a target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationResult {
    /// The user rejected the download.
    Canceled,
    /// The user accepted the path.
    Confirmed,
    /// The user accepted through a platform dialog; the chosen path must be
    /// validated again.
    ConfirmedWithDialog,
    /// No prompt was shown; no consent was obtained.
    ContinueWithoutConfirmation,
}

/// How to handle an existing file at the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
    /// Generate a unique name next to the existing file.
    #[default]
    Uniquify,
    /// Replace the existing file.
    Overwrite,
    /// Ask the user.
    Prompt,
}

/// Result of reserving a virtual path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathValidationResult {
    /// The path (possibly uniquified) is reserved.
    Success,
    /// The target directory is not writable.
    PathNotWritable,
    /// The file name exceeds the filesystem limit.
    NameTooLong,
    /// A conflicting file exists and could not be resolved.
    Conflict,
    /// The target is the file being downloaded.
    SameAsSource,
}

/// Mixed-content classification of the download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixedContentStatus {
    /// Not yet determined.
    #[default]
    Unknown,
    /// Secure delivery.
    Safe,
    /// Insecure but validated by the user.
    Validated,
    /// Insecure; warn the user.
    Warn,
    /// Insecure; block with a visible notice.
    Block,
    /// Insecure; block without telling the user.
    SilentBlock,
}

/// Requested treatment of the target location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDisposition {
    /// Use the target path as-is.
    #[default]
    Overwrite,
    /// Ask the user where to save ("save as").
    Prompt,
    /// Generate a unique name if needed.
    Uniquify,
}

/// Why a download stopped. Only `None`, `UserCanceled`, `FileBlocked` and
/// `FileFailed` are ever produced by target determination; the remaining
/// variants describe prior failures fed back in on resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptReason {
    /// No interruption.
    #[default]
    None,
    /// Generic file failure.
    FileFailed,
    /// The target could not be written.
    FileAccessDenied,
    /// Not enough disk space.
    FileNoSpace,
    /// The file name was too long.
    FileNameTooLong,
    /// The file exceeds the filesystem limit.
    FileTooLarge,
    /// The file was blocked by policy.
    FileBlocked,
    /// A transient filesystem error.
    FileTransientError,
    /// Generic network failure.
    NetworkFailed,
    /// The network timed out.
    NetworkTimeout,
    /// The server reported an error.
    ServerFailed,
    /// The user cancelled.
    UserCanceled,
    /// The browser shut down.
    UserShutdown,
    /// The browser crashed.
    Crash,
}

/// Lifecycle state of the tracked download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Bytes are being received.
    #[default]
    InProgress,
    /// All bytes received.
    Complete,
    /// Cancelled by the user.
    Cancelled,
    /// Stopped on an error; may be resumed.
    Interrupted,
}

/// What started the download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadSource {
    /// Unknown origin.
    #[default]
    Unknown,
    /// A navigation that turned into a download.
    Navigation,
    /// Drag and drop out of a page.
    DragAndDrop,
    /// Initiated by the renderer (e.g. `<a download>`).
    FromRenderer,
    /// The extension downloads API.
    ExtensionApi,
    /// The extension installer.
    ExtensionInstaller,
    /// A browser-internal request.
    InternalApi,
    /// A context-menu "save link as".
    ContextMenu,
    /// A retry from the download UI.
    RetryFromBubble,
}

/// Core navigation type that led to the download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    /// The user followed a link.
    #[default]
    Link,
    /// The user typed the URL.
    Typed,
    /// The user picked a bookmark.
    AutoBookmark,
    /// A search suggestion from the address bar.
    Generated,
    /// A keyword search.
    Keyword,
    /// A form submission.
    FormSubmit,
    /// A reload.
    Reload,
    /// Anything else (subframes, redirects, ...).
    Other,
}

/// Navigation type plus the "came from the address bar" qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageTransition {
    /// Core transition type.
    #[serde(default)]
    pub core: TransitionType,
    /// The navigation was started from the address bar.
    #[serde(default)]
    pub from_address_bar: bool,
}

impl PageTransition {
    /// Creates a transition without qualifiers.
    #[must_use]
    pub fn new(core: TransitionType) -> Self {
        Self {
            core,
            from_address_bar: false,
        }
    }

    /// Creates a transition that originated in the address bar.
    #[must_use]
    pub fn from_address_bar(core: TransitionType) -> Self {
        Self {
            core,
            from_address_bar: true,
        }
    }
}
