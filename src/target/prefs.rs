//! Download preferences consumed by target determination.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use url::Url;

use super::file_types::{FileTypePolicies, extension_of, normalize_extension};

/// Name used when nothing better can be derived from the download.
pub const DEFAULT_DOWNLOAD_FILENAME: &str = "download";

/// Preference view shared by every determination run of a profile.
///
/// All fields are read-only except the last "save as" directory, which a
/// confirmed prompt updates so the next prompt opens in the same place.
#[derive(Debug)]
pub struct DownloadPrefs {
    download_dir: PathBuf,
    save_file_dir: Mutex<PathBuf>,
    download_dir_managed: bool,
    prompt_for_download: bool,
    auto_open_by_user: HashSet<String>,
    auto_open_by_policy: HashSet<String>,
    trusted_install_sources: Vec<String>,
    default_filename: String,
    file_types: FileTypePolicies,
}

impl DownloadPrefs {
    /// Creates preferences rooted at `download_dir` with every option off.
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        let download_dir = download_dir.into();
        Self {
            save_file_dir: Mutex::new(download_dir.clone()),
            download_dir,
            download_dir_managed: false,
            prompt_for_download: false,
            auto_open_by_user: HashSet::new(),
            auto_open_by_policy: HashSet::new(),
            trusted_install_sources: Vec::new(),
            default_filename: DEFAULT_DOWNLOAD_FILENAME.to_string(),
            file_types: FileTypePolicies::default(),
        }
    }

    /// Sets the directory last chosen in a "save as" prompt.
    #[must_use]
    pub fn with_save_file_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.set_save_file_dir(dir);
        self
    }

    /// Marks the download directory as administratively managed.
    #[must_use]
    pub fn with_managed_download_dir(mut self, managed: bool) -> Self {
        self.download_dir_managed = managed;
        self
    }

    /// Asks the user for a location on every download.
    #[must_use]
    pub fn with_prompt_for_download(mut self, prompt: bool) -> Self {
        self.prompt_for_download = prompt;
        self
    }

    /// Adds extensions the user chose to open automatically.
    #[must_use]
    pub fn with_auto_open_by_user<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.auto_open_by_user
            .extend(extensions.into_iter().map(|ext| normalize_extension(ext.as_ref())));
        self
    }

    /// Adds extensions that policy opens automatically.
    #[must_use]
    pub fn with_auto_open_by_policy<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.auto_open_by_policy
            .extend(extensions.into_iter().map(|ext| normalize_extension(ext.as_ref())));
        self
    }

    /// Adds host patterns (`example.com` or `*.example.com`) allowed to
    /// install extension packages without prompting.
    #[must_use]
    pub fn with_trusted_install_sources<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_install_sources
            .extend(hosts.into_iter().map(|host| host.into().to_ascii_lowercase()));
        self
    }

    /// Replaces the fallback filename.
    #[must_use]
    pub fn with_default_filename(mut self, name: impl Into<String>) -> Self {
        self.default_filename = name.into();
        self
    }

    /// Replaces the file-type classifier.
    #[must_use]
    pub fn with_file_types(mut self, file_types: FileTypePolicies) -> Self {
        self.file_types = file_types;
        self
    }

    /// Default download directory.
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Directory last chosen in a "save as" prompt.
    #[must_use]
    pub fn save_file_dir(&self) -> PathBuf {
        self.save_file_dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remembers the directory the user picked in a prompt.
    pub fn set_save_file_dir(&self, dir: impl Into<PathBuf>) {
        *self
            .save_file_dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = dir.into();
    }

    /// Returns true if an administrator fixed the download directory.
    #[must_use]
    pub fn is_download_path_managed(&self) -> bool {
        self.download_dir_managed
    }

    /// Returns true if the user wants to be asked for every download.
    #[must_use]
    pub fn prompt_for_download(&self) -> bool {
        self.prompt_for_download
    }

    /// Returns true if files named like `path` are opened automatically.
    #[must_use]
    pub fn is_auto_open_enabled(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| {
            self.auto_open_by_user.contains(&ext) || self.auto_open_by_policy.contains(&ext)
        })
    }

    /// Returns true if `url` is served by a trusted install source.
    #[must_use]
    pub fn is_trusted_install_source(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.trusted_install_sources
            .iter()
            .any(|pattern| host_matches(pattern, &host))
    }

    /// Fallback filename.
    #[must_use]
    pub fn default_filename(&self) -> &str {
        &self.default_filename
    }

    /// File-type classifier.
    #[must_use]
    pub fn file_types(&self) -> &FileTypePolicies {
        &self.file_types
    }
}

fn host_matches(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(domain) => host == domain || host.ends_with(&format!(".{domain}")),
        None => host == pattern,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_prefs_save_dir_defaults_to_download_dir() {
        let prefs = DownloadPrefs::new("/home/u/Downloads");
        assert_eq!(prefs.save_file_dir(), PathBuf::from("/home/u/Downloads"));
        assert!(!prefs.prompt_for_download());
        assert!(!prefs.is_download_path_managed());
        assert_eq!(prefs.default_filename(), DEFAULT_DOWNLOAD_FILENAME);
    }

    #[test]
    fn test_set_save_file_dir_is_visible_through_shared_reference() {
        let prefs = std::sync::Arc::new(DownloadPrefs::new("/dl"));
        let other = std::sync::Arc::clone(&prefs);
        other.set_save_file_dir("/picked");
        assert_eq!(prefs.save_file_dir(), PathBuf::from("/picked"));
    }

    #[test]
    fn test_auto_open_matches_user_and_policy_extensions() {
        let prefs = DownloadPrefs::new("/dl")
            .with_auto_open_by_user([".TXT"])
            .with_auto_open_by_policy(["pdf"]);
        assert!(prefs.is_auto_open_enabled(Path::new("/dl/a.txt")));
        assert!(prefs.is_auto_open_enabled(Path::new("b.PDF")));
        assert!(!prefs.is_auto_open_enabled(Path::new("c.exe")));
        assert!(!prefs.is_auto_open_enabled(Path::new("txt")));
    }

    #[test]
    fn test_trusted_install_source_patterns() {
        let prefs = DownloadPrefs::new("/dl")
            .with_trusted_install_sources(["store.example.com", "*.cdn.example.org"]);
        let trusted = |url: &str| prefs.is_trusted_install_source(&Url::parse(url).unwrap());

        assert!(trusted("https://store.example.com/x.crx"));
        assert!(trusted("https://a.cdn.example.org/x.crx"));
        assert!(trusted("https://cdn.example.org/x.crx"));
        assert!(!trusted("https://evil-store.example.com/x.crx"));
        assert!(!trusted("https://example.com/x.crx"));
    }
}
