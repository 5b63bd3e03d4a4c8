//! Working filename used while the bytes are still arriving.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use rand::Rng;

use super::snapshot::DownloadSnapshot;
use super::state::WorkflowState;
use super::types::DangerType;

/// Suffix marking a file that is still being downloaded.
pub const CRDOWNLOAD_SUFFIX: &str = ".crdownload";

/// Prefix of the random name given to dangerous downloads.
pub const UNCONFIRMED_PREFIX: &str = "Unconfirmed";

/// Upper bound (exclusive) of the random number in an unconfirmed name.
pub const UNCONFIRMED_RANGE: u32 = 1_000_000;

const CONTENT_URI_SCHEME: &str = "content://";

/// Returns true if `path` is a content URI rather than a filesystem path.
#[must_use]
pub fn is_content_uri(path: &Path) -> bool {
    path.to_str()
        .is_some_and(|p| p.starts_with(CONTENT_URI_SCHEME))
}

/// Appends [`CRDOWNLOAD_SUFFIX`] to the file name of `path`.
#[must_use]
pub fn crdownload_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(CRDOWNLOAD_SUFFIX);
    PathBuf::from(name)
}

/// Picks the intermediate path for a run whose local path is settled.
///
/// Dangerous first attempts get `Unconfirmed <N>.crdownload` next to the
/// local path. Two runs may draw the same `N`; the collision is not checked
/// here because the intermediate file is always created uniquified.
pub fn determine_intermediate_path<R: Rng + ?Sized>(
    download: &DownloadSnapshot,
    state: &WorkflowState,
    rng: &mut R,
) -> PathBuf {
    let local = &state.local_path;

    if is_content_uri(local) {
        return local.clone();
    }

    // A remapped virtual path means the local path is already temporary.
    if state.virtual_path.file_name() != local.file_name() {
        return local.clone();
    }

    let safe = state.danger_type == DangerType::NotDangerous;
    if safe && download.forced_path().is_some() {
        return local.clone();
    }
    if safe && download.is_transient {
        return local.clone();
    }
    if safe {
        return crdownload_path(local);
    }

    if state.is_resumption
        && let Some(full_path) = download.current_path()
        && full_path.parent() == local.parent()
    {
        return full_path.to_path_buf();
    }

    let n = rng.gen_range(0..UNCONFIRMED_RANGE);
    let name = format!("{UNCONFIRMED_PREFIX} {n}{CRDOWNLOAD_SUFFIX}");
    local
        .parent()
        .map_or_else(|| PathBuf::from(&name), |dir| dir.join(&name))
}
