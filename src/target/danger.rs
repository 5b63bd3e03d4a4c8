//! Danger level policy for a download's file type.

use chrono::{DateTime, Local};

use super::confirmation::is_trusted_install_download;
use super::delegate::VisitCount;
use super::prefs::DownloadPrefs;
use super::snapshot::DownloadSnapshot;
use super::state::WorkflowState;
use super::types::DangerLevel;

/// Returns the danger level of the download in its current state.
///
/// Downloads the user was (or will be) asked about, forced paths, trusted
/// extension installs with a gesture, and auto-opened types with a gesture
/// are not dangerous. Otherwise the file-type classifier decides; its
/// "allow on user gesture" tier is waived when the navigation came from the
/// address bar, or when a gesture is present and the referrer was visited
/// before today.
#[must_use]
pub fn danger_level(
    download: &DownloadSnapshot,
    state: &WorkflowState,
    prefs: &DownloadPrefs,
    visited_referrer_before: bool,
) -> DangerLevel {
    if state.has_prompted_for_path(download)
        || state.confirmation_reason.is_required()
        || download.forced_path().is_some()
    {
        return DangerLevel::NotDangerous;
    }

    if download.has_user_gesture && is_trusted_install_download(download, prefs) {
        return DangerLevel::NotDangerous;
    }

    if download.has_user_gesture && prefs.is_auto_open_enabled(&state.virtual_path) {
        return DangerLevel::NotDangerous;
    }

    let level = prefs.file_types().danger_level(&state.virtual_path);
    if level == DangerLevel::AllowOnUserGesture
        && (download.transition.from_address_bar
            || (download.has_user_gesture && visited_referrer_before))
    {
        return DangerLevel::NotDangerous;
    }
    level
}

/// Condenses a visit-count lookup into "visited before today".
///
/// The referrer counts as visited when the lookup succeeded, found visible
/// visits, and the first of them happened before the most recent local
/// midnight.
#[must_use]
pub fn visited_before(visits: Option<&VisitCount>, now: DateTime<Local>) -> bool {
    visits.is_some_and(|v| {
        v.count > 0
            && v.first_visit
                .is_some_and(|first| first.with_timezone(&Local).date_naive() < now.date_naive())
    })
}
