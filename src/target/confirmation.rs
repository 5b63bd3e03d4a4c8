//! Decides whether the user has to confirm a download's target path.

use std::path::Path;

use super::prefs::DownloadPrefs;
use super::snapshot::DownloadSnapshot;
use super::types::{ConfirmationReason, InterruptReason, TargetDisposition};

/// Returns the reason the user must confirm `filename`, or
/// [`ConfirmationReason::None`].
///
/// Rules are checked in order and the first match wins:
///
/// 1. transient downloads never prompt;
/// 2. resumed downloads only prompt when the previous attempt failed because
///    of the target location;
/// 3. forced paths never prompt;
/// 4. a managed download directory never prompts, not even for "save as";
/// 5. "save as" prompts;
/// 6. extension packages from trusted install sources do not prompt;
/// 7. auto-opened file types do not prompt;
/// 8. otherwise the "ask where to save" preference decides.
#[must_use]
pub fn needs_confirmation(
    download: &DownloadSnapshot,
    is_resumption: bool,
    prefs: &DownloadPrefs,
    filename: &Path,
) -> ConfirmationReason {
    if download.is_transient {
        return ConfirmationReason::None;
    }

    if is_resumption {
        return match download.last_reason {
            InterruptReason::FileAccessDenied => ConfirmationReason::TargetPathNotWriteable,
            InterruptReason::FileTooLarge | InterruptReason::FileNoSpace => {
                ConfirmationReason::TargetNoSpace
            }
            _ => ConfirmationReason::None,
        };
    }

    if download.forced_path().is_some() {
        return ConfirmationReason::None;
    }

    if prefs.is_download_path_managed() {
        return ConfirmationReason::None;
    }

    if download.target_disposition == TargetDisposition::Prompt {
        return ConfirmationReason::SaveAs;
    }

    if is_trusted_install_download(download, prefs) {
        return ConfirmationReason::None;
    }

    if prefs.is_auto_open_enabled(filename) {
        return ConfirmationReason::None;
    }

    if prefs.prompt_for_download() {
        ConfirmationReason::Preference
    } else {
        ConfirmationReason::None
    }
}

/// Returns true for extension packages served by a trusted install source.
#[must_use]
pub fn is_trusted_install_download(download: &DownloadSnapshot, prefs: &DownloadPrefs) -> bool {
    download.is_extension_install()
        && download
            .url()
            .is_some_and(|url| prefs.is_trusted_install_source(url))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use url::Url;

    use super::*;
    use crate::target::snapshot::EXTENSION_MIME_TYPE;

    fn snapshot(url: &str) -> DownloadSnapshot {
        DownloadSnapshot::new(Url::parse(url).unwrap())
    }

    fn reason(download: &DownloadSnapshot, resumed: bool, prefs: &DownloadPrefs) -> ConfirmationReason {
        needs_confirmation(download, resumed, prefs, Path::new("file.txt"))
    }

    #[test]
    fn test_automatic_download_without_preference_needs_nothing() {
        let prefs = DownloadPrefs::new("/dl");
        assert_eq!(
            reason(&snapshot("https://example.com/a"), false, &prefs),
            ConfirmationReason::None
        );
    }

    #[test]
    fn test_prompt_preference() {
        let prefs = DownloadPrefs::new("/dl").with_prompt_for_download(true);
        assert_eq!(
            reason(&snapshot("https://example.com/a"), false, &prefs),
            ConfirmationReason::Preference
        );
    }

    #[test]
    fn test_transient_never_prompts() {
        let prefs = DownloadPrefs::new("/dl").with_prompt_for_download(true);
        let mut item = snapshot("https://example.com/a");
        item.is_transient = true;
        item.target_disposition = TargetDisposition::Prompt;
        item.last_reason = InterruptReason::FileAccessDenied;
        assert_eq!(reason(&item, true, &prefs), ConfirmationReason::None);
    }

    #[test]
    fn test_resumption_maps_prior_interrupt_reason() {
        let prefs = DownloadPrefs::new("/dl").with_prompt_for_download(true);
        let mut item = snapshot("https://example.com/a");
        item.target_disposition = TargetDisposition::Prompt;

        item.last_reason = InterruptReason::FileAccessDenied;
        assert_eq!(
            reason(&item, true, &prefs),
            ConfirmationReason::TargetPathNotWriteable
        );
        item.last_reason = InterruptReason::FileNoSpace;
        assert_eq!(reason(&item, true, &prefs), ConfirmationReason::TargetNoSpace);
        item.last_reason = InterruptReason::FileTooLarge;
        assert_eq!(reason(&item, true, &prefs), ConfirmationReason::TargetNoSpace);
        item.last_reason = InterruptReason::NetworkFailed;
        assert_eq!(reason(&item, true, &prefs), ConfirmationReason::None);
    }

    #[test]
    fn test_forced_path_never_prompts() {
        let prefs = DownloadPrefs::new("/dl").with_prompt_for_download(true);
        let mut item = snapshot("https://example.com/a");
        item.forced_file_path = Some(PathBuf::from("/dl/forced.txt"));
        assert_eq!(reason(&item, false, &prefs), ConfirmationReason::None);
    }

    #[test]
    fn test_managed_path_overrides_save_as() {
        let prefs = DownloadPrefs::new("/dl")
            .with_prompt_for_download(true)
            .with_managed_download_dir(true);
        let mut item = snapshot("https://example.com/a");
        item.target_disposition = TargetDisposition::Prompt;
        assert_eq!(reason(&item, false, &prefs), ConfirmationReason::None);
    }

    #[test]
    fn test_save_as_prompts_even_for_auto_open_types() {
        let prefs = DownloadPrefs::new("/dl").with_auto_open_by_user(["txt"]);
        let mut item = snapshot("https://example.com/a");
        item.target_disposition = TargetDisposition::Prompt;
        assert_eq!(reason(&item, false, &prefs), ConfirmationReason::SaveAs);
    }

    #[test]
    fn test_auto_open_suppresses_preference_prompt() {
        let prefs = DownloadPrefs::new("/dl")
            .with_prompt_for_download(true)
            .with_auto_open_by_user(["txt"]);
        assert_eq!(
            reason(&snapshot("https://example.com/a"), false, &prefs),
            ConfirmationReason::None
        );
    }

    #[test]
    fn test_trusted_extension_install_skips_prompt() {
        let prefs = DownloadPrefs::new("/dl")
            .with_prompt_for_download(true)
            .with_trusted_install_sources(["store.example.com"]);

        let mut trusted = snapshot("https://store.example.com/ext");
        trusted.mime_type = EXTENSION_MIME_TYPE.to_string();
        assert_eq!(reason(&trusted, false, &prefs), ConfirmationReason::None);

        let mut untrusted = snapshot("https://other.example.com/ext");
        untrusted.mime_type = EXTENSION_MIME_TYPE.to_string();
        assert_eq!(
            reason(&untrusted, false, &prefs),
            ConfirmationReason::Preference
        );
    }
}
