//! Read-only view of the download whose target is being determined.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use super::types::{
    DangerType, DownloadSource, DownloadState, InterruptReason, PageTransition, TargetDisposition,
};

/// MIME type used by extension packages.
pub const EXTENSION_MIME_TYPE: &str = "application/x-chrome-extension";

/// Attributes of an in-flight download, owned by the host.
///
/// The determination machine shares the snapshot for the lifetime of a run
/// and never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSnapshot {
    /// Redirect history; the last entry is the URL the bytes come from.
    pub url_chain: Vec<Url>,
    /// Referrer of the request that started the download. Empty or
    /// unparsable values read as no referrer.
    #[serde(deserialize_with = "lenient_url")]
    pub referrer_url: Option<Url>,
    /// Raw `Content-Disposition` header value.
    pub content_disposition: String,
    /// Filename suggested by the page (e.g. `<a download="...">`).
    pub suggested_filename: String,
    /// Sniffed MIME type.
    pub mime_type: String,
    /// MIME type declared by the server before sniffing.
    pub original_mime_type: String,
    /// Path chosen programmatically (drag and drop, installer downloads).
    pub forced_file_path: Option<PathBuf>,
    /// File currently holding the received bytes, if any.
    pub full_path: Option<PathBuf>,
    /// Reason the previous attempt stopped.
    pub last_reason: InterruptReason,
    /// Requested target disposition.
    pub target_disposition: TargetDisposition,
    /// Transient downloads are invisible to the user and never prompt.
    pub is_transient: bool,
    /// The download was started by a user gesture.
    pub has_user_gesture: bool,
    /// Navigation that led to the download.
    pub transition: PageTransition,
    /// Danger type recorded before this run.
    pub danger_type: DangerType,
    /// What started the download.
    pub source: DownloadSource,
    /// Lifecycle state of the download.
    pub state: DownloadState,
}

impl DownloadSnapshot {
    /// Creates a snapshot for a plain in-progress download of `url`.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url_chain: vec![url],
            ..Self::default()
        }
    }

    /// Returns the final URL of the redirect chain.
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.url_chain.last()
    }

    /// Returns the forced path, treating an empty path as absent.
    #[must_use]
    pub fn forced_path(&self) -> Option<&Path> {
        self.forced_file_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Returns the on-disk working file, treating an empty path as absent.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.full_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Returns true if the download is still receiving bytes.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.state == DownloadState::InProgress
    }

    /// Returns true if the download installs an extension package.
    #[must_use]
    pub fn is_extension_install(&self) -> bool {
        if self.source == DownloadSource::ExtensionInstaller
            || self.mime_type.eq_ignore_ascii_case(EXTENSION_MIME_TYPE)
        {
            return true;
        }
        self.url().is_some_and(|url| {
            url.path()
                .rsplit('/')
                .next()
                .is_some_and(|leaf| leaf.to_ascii_lowercase().ends_with(".crx"))
        })
    }
}

fn lenient_url<'de, D>(deserializer: D) -> Result<Option<Url>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| Url::parse(raw.trim()).ok()))
}
