//! Filesystem-backed collaborator for running determinations outside a
//! browser.
//!
//! Reservations look at the real filesystem. Prompts are answered with a
//! fixed response and there are no extensions or visit history.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::target::{
    Confirmation, ConfirmationReason, ConfirmationResult, ConflictAction, DangerType,
    DownloadSnapshot, ExtensionSuggestion, LocalPath, MixedContentStatus, PathValidationResult,
    Reservation, TargetDelegate, mime_for_extension,
};

/// Longest file name, in bytes, most filesystems accept.
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Highest `(N)` tried when uniquifying a name.
pub const MAX_UNIQUE_SUFFIX: u32 = 100;

/// Scripted answer to location prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptResponse {
    /// Accept the offered path without showing a prompt.
    #[default]
    Continue,
    /// Accept the offered path as if the user confirmed it.
    Confirm,
    /// Dismiss the prompt.
    Cancel,
}

/// [`TargetDelegate`] backed by the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalDelegate {
    prompt_response: PromptResponse,
    dangerous_hosts: Vec<String>,
}

impl LocalDelegate {
    /// Creates a delegate answering prompts with `prompt_response`.
    #[must_use]
    pub fn new(prompt_response: PromptResponse) -> Self {
        Self {
            prompt_response,
            dangerous_hosts: Vec::new(),
        }
    }

    /// Reports downloads from these hosts (and their subdomains) as
    /// dangerous URLs.
    #[must_use]
    pub fn with_dangerous_hosts(mut self, hosts: Vec<String>) -> Self {
        self.dangerous_hosts = hosts;
        self
    }

    fn is_dangerous_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.dangerous_hosts
            .iter()
            .any(|bad| host == *bad || host.ends_with(&format!(".{bad}")))
    }
}

#[async_trait]
impl TargetDelegate for LocalDelegate {
    async fn mixed_content_status(
        &self,
        download: &DownloadSnapshot,
        _virtual_path: &Path,
    ) -> MixedContentStatus {
        let secure_referrer = download
            .referrer_url
            .as_ref()
            .is_some_and(|url| url.scheme() == "https");
        let insecure_source = download.url().is_some_and(|url| url.scheme() == "http");
        if secure_referrer && insecure_source {
            MixedContentStatus::Warn
        } else {
            MixedContentStatus::Safe
        }
    }

    async fn notify_extensions(
        &self,
        _download: &DownloadSnapshot,
        _virtual_path: &Path,
    ) -> ExtensionSuggestion {
        ExtensionSuggestion::default()
    }

    async fn reserve_virtual_path(
        &self,
        _download: &DownloadSnapshot,
        virtual_path: &Path,
        create_directory: bool,
        conflict_action: ConflictAction,
    ) -> Reservation {
        reserve(virtual_path, create_directory, conflict_action).await
    }

    async fn request_confirmation(
        &self,
        _download: &DownloadSnapshot,
        virtual_path: &Path,
        reason: ConfirmationReason,
    ) -> Confirmation {
        debug!(?reason, response = ?self.prompt_response, "answering location prompt");
        let result = match self.prompt_response {
            PromptResponse::Continue => ConfirmationResult::ContinueWithoutConfirmation,
            PromptResponse::Confirm => ConfirmationResult::Confirmed,
            PromptResponse::Cancel => ConfirmationResult::Canceled,
        };
        Confirmation::new(result, virtual_path)
    }

    async fn determine_local_path(
        &self,
        _download: &DownloadSnapshot,
        virtual_path: &Path,
    ) -> LocalPath {
        LocalPath::identity(virtual_path)
    }

    async fn file_mime_type(&self, local_path: &Path) -> Option<String> {
        let ext = local_path.extension()?.to_str()?;
        mime_for_extension(ext).map(str::to_string)
    }

    async fn check_download_url(
        &self,
        download: &DownloadSnapshot,
        _virtual_path: &Path,
    ) -> DangerType {
        match download.url().and_then(url::Url::host_str) {
            Some(host) if self.is_dangerous_host(host) => DangerType::DangerousUrl,
            _ => DangerType::NotDangerous,
        }
    }
}

async fn reserve(
    path: &Path,
    create_directory: bool,
    conflict_action: ConflictAction,
) -> Reservation {
    let not_writable = || Reservation::new(PathValidationResult::PathNotWritable, path);

    let Some(parent) = path.parent() else {
        return not_writable();
    };
    if create_directory
        && let Err(error) = tokio::fs::create_dir_all(parent).await
    {
        warn!(dir = %parent.display(), error = %error, "cannot create target directory");
        return not_writable();
    }
    match tokio::fs::metadata(parent).await {
        Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {}
        _ => return not_writable(),
    }

    let name_len = path.file_name().map_or(0, |name| name.as_encoded_bytes().len());
    if name_len > MAX_FILE_NAME_BYTES {
        return Reservation::new(PathValidationResult::NameTooLong, path);
    }

    if !exists(path).await {
        return Reservation::new(PathValidationResult::Success, path);
    }

    match conflict_action {
        ConflictAction::Overwrite => Reservation::new(PathValidationResult::Success, path),
        ConflictAction::Prompt => Reservation::new(PathValidationResult::Conflict, path),
        ConflictAction::Uniquify => {
            for n in 1..=MAX_UNIQUE_SUFFIX {
                let candidate = uniquified_path(path, n);
                if !exists(&candidate).await {
                    return Reservation::new(PathValidationResult::Success, candidate);
                }
            }
            Reservation::new(PathValidationResult::Conflict, path)
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Inserts ` (n)` before the extension: `report.pdf` -> `report (1).pdf`.
#[must_use]
pub fn uniquified_path(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    };
    path.with_file_name(name)
}
