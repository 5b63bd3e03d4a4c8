//! File-type classification: extension to danger level.
//!
//! The built-in table follows the usual desktop split: executables and
//! scripts are dangerous unless explained by a user action, shell-link style
//! files are always dangerous, and archives are "checked binaries" whose
//! extension must never be rewritten from a sniffed MIME type.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::types::DangerLevel;

/// Extensions that are dangerous unless explained by a user gesture.
const ALLOW_ON_USER_GESTURE: &[&str] = &[
    "app", "apk", "appimage", "bat", "cmd", "com", "cpl", "deb", "dll", "dmg", "exe", "hta",
    "jar", "jnlp", "js", "msi", "msp", "pkg", "ps1", "reg", "rpm", "scr", "sh", "vbe", "vbs",
    "wsf",
];

/// Extensions that are always dangerous.
const ALWAYS_DANGEROUS: &[&str] = &[
    "library-ms",
    "lnk",
    "local",
    "mof",
    "scf",
    "settingcontent-ms",
];

/// Non-executable extensions that are still inspected by download protection.
const CHECKED_ARCHIVES: &[&str] = &[
    "7z", "bz2", "cab", "gz", "img", "iso", "rar", "tar", "tgz", "xz", "zip",
];

/// Extension-keyed danger classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypePolicies {
    levels: HashMap<String, DangerLevel>,
    checked: HashSet<String>,
}

impl Default for FileTypePolicies {
    fn default() -> Self {
        let mut levels = HashMap::new();
        for ext in ALLOW_ON_USER_GESTURE {
            levels.insert((*ext).to_string(), DangerLevel::AllowOnUserGesture);
        }
        for ext in ALWAYS_DANGEROUS {
            levels.insert((*ext).to_string(), DangerLevel::Dangerous);
        }
        let checked = CHECKED_ARCHIVES
            .iter()
            .map(|ext| (*ext).to_string())
            .collect();
        Self { levels, checked }
    }
}

impl FileTypePolicies {
    /// Creates a classifier that treats every file as not dangerous.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            levels: HashMap::new(),
            checked: HashSet::new(),
        }
    }

    /// Replaces the danger level of individual extensions.
    ///
    /// Keys are matched case-insensitively and may carry a leading dot.
    #[must_use]
    pub fn with_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, DangerLevel)>,
    {
        for (ext, level) in overrides {
            let ext = normalize_extension(&ext);
            if ext.is_empty() {
                continue;
            }
            if level == DangerLevel::NotDangerous {
                self.levels.remove(&ext);
            } else {
                self.levels.insert(ext, level);
            }
        }
        self
    }

    /// Returns the danger level of `file_name` based on its extension.
    #[must_use]
    pub fn danger_level(&self, file_name: &Path) -> DangerLevel {
        extension_of(file_name)
            .and_then(|ext| self.levels.get(&ext).copied())
            .unwrap_or_default()
    }

    /// Returns true if download protection inspects files of this type.
    ///
    /// Such names keep the extension they were generated with.
    #[must_use]
    pub fn is_checked_binary(&self, file_name: &Path) -> bool {
        extension_of(file_name).is_some_and(|ext| {
            self.levels.contains_key(&ext) || self.checked.contains(&ext)
        })
    }
}

/// Lowercases an extension and strips a leading dot.
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Lowercased extension of the final path component, ignoring trailing dots
/// and spaces that some platforms silently drop.
pub(crate) fn extension_of(file_name: &Path) -> Option<String> {
    let leaf = file_name.file_name()?.to_string_lossy();
    let leaf = leaf.trim_end_matches(['.', ' ']);
    let (stem, ext) = leaf.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executables_allow_on_user_gesture() {
        let policies = FileTypePolicies::default();
        assert_eq!(
            policies.danger_level(Path::new("/dl/setup.exe")),
            DangerLevel::AllowOnUserGesture
        );
        assert_eq!(
            policies.danger_level(Path::new("INSTALL.MSI")),
            DangerLevel::AllowOnUserGesture
        );
    }

    #[test]
    fn test_shell_links_always_dangerous() {
        let policies = FileTypePolicies::default();
        assert_eq!(
            policies.danger_level(Path::new("open.lnk")),
            DangerLevel::Dangerous
        );
    }

    #[test]
    fn test_documents_not_dangerous() {
        let policies = FileTypePolicies::default();
        assert_eq!(
            policies.danger_level(Path::new("report.pdf")),
            DangerLevel::NotDangerous
        );
        assert_eq!(
            policies.danger_level(Path::new("README")),
            DangerLevel::NotDangerous
        );
    }

    #[test]
    fn test_trailing_dots_do_not_hide_extension() {
        let policies = FileTypePolicies::default();
        assert_eq!(
            policies.danger_level(Path::new("evil.exe. .")),
            DangerLevel::AllowOnUserGesture
        );
    }

    #[test]
    fn test_dotfile_has_no_extension() {
        assert_eq!(extension_of(Path::new(".bashrc")), None);
    }

    #[test]
    fn test_checked_binary_covers_archives_and_executables() {
        let policies = FileTypePolicies::default();
        assert!(policies.is_checked_binary(Path::new("bundle.zip")));
        assert!(policies.is_checked_binary(Path::new("setup.exe")));
        assert!(!policies.is_checked_binary(Path::new("notes.txt")));
    }

    #[test]
    fn test_overrides_replace_and_remove_levels() {
        let policies = FileTypePolicies::default().with_overrides([
            (".EXE".to_string(), DangerLevel::NotDangerous),
            ("foo".to_string(), DangerLevel::Dangerous),
        ]);
        assert_eq!(
            policies.danger_level(Path::new("setup.exe")),
            DangerLevel::NotDangerous
        );
        assert_eq!(
            policies.danger_level(Path::new("x.foo")),
            DangerLevel::Dangerous
        );
    }

    #[test]
    fn test_empty_policies_classify_nothing() {
        let policies = FileTypePolicies::empty();
        assert_eq!(
            policies.danger_level(Path::new("setup.exe")),
            DangerLevel::NotDangerous
        );
        assert!(!policies.is_checked_binary(Path::new("setup.exe")));
    }
}
