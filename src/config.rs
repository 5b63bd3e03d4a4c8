//! TOML preference file for the command-line host.
//!
//! The file maps onto [`DownloadPrefs`]; a missing default file means every
//! preference keeps its default.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::target::{DangerLevel, DownloadPrefs, FileTypePolicies, normalize_extension};

/// Directory name used under the config home.
pub const CONFIG_DIR_NAME: &str = "download-target";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading the preference file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file not found: {path}")]
    NotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not acceptable.
    #[error("invalid config value for `{key}`: {message}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

/// Preferences as written in `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrefsConfig {
    /// Default download directory.
    pub download_dir: Option<PathBuf>,
    /// Directory offered first in "save as" prompts.
    pub save_file_dir: Option<PathBuf>,
    /// The download directory is fixed by an administrator.
    pub download_dir_managed: bool,
    /// Ask where to save every download.
    pub prompt_for_download: bool,
    /// Extensions the user opens automatically.
    pub auto_open_extensions: Vec<String>,
    /// Extensions policy opens automatically.
    pub policy_auto_open_extensions: Vec<String>,
    /// Hosts allowed to install extension packages without prompting.
    pub trusted_install_sources: Vec<String>,
    /// Fallback filename.
    pub default_filename: Option<String>,
    /// Hosts whose downloads are reported as dangerous URLs.
    pub dangerous_hosts: Vec<String>,
    /// Per-extension danger level overrides.
    pub file_types: BTreeMap<String, DangerLevel>,
}

impl PrefsConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for unacceptable values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise
    /// the errors of [`PrefsConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Checks values serde cannot check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_dir("download_dir", self.download_dir.as_deref())?;
        validate_dir("save_file_dir", self.save_file_dir.as_deref())?;
        validate_entries("auto_open_extensions", &self.auto_open_extensions)?;
        validate_entries("policy_auto_open_extensions", &self.policy_auto_open_extensions)?;
        validate_entries("trusted_install_sources", &self.trusted_install_sources)?;
        validate_entries("dangerous_hosts", &self.dangerous_hosts)?;
        validate_entries("file_types", self.file_types.keys())?;

        if let Some(name) = &self.default_filename
            && (name.trim().is_empty() || name.contains(['/', '\\']))
        {
            return Err(ConfigError::invalid(
                "default_filename",
                format!("'{name}' is not a plain file name"),
            ));
        }
        Ok(())
    }

    /// Builds the preference view, falling back to `default_download_dir`
    /// when the file names none.
    #[must_use]
    pub fn to_prefs(&self, default_download_dir: &Path) -> DownloadPrefs {
        let download_dir = self
            .download_dir
            .clone()
            .unwrap_or_else(|| default_download_dir.to_path_buf());
        let save_file_dir = self
            .save_file_dir
            .clone()
            .unwrap_or_else(|| download_dir.clone());

        let file_types = FileTypePolicies::default().with_overrides(
            self.file_types
                .iter()
                .map(|(ext, level)| (normalize_extension(ext), *level)),
        );

        let mut prefs = DownloadPrefs::new(download_dir)
            .with_save_file_dir(save_file_dir)
            .with_managed_download_dir(self.download_dir_managed)
            .with_prompt_for_download(self.prompt_for_download)
            .with_auto_open_by_user(&self.auto_open_extensions)
            .with_auto_open_by_policy(&self.policy_auto_open_extensions)
            .with_trusted_install_sources(self.trusted_install_sources.iter().cloned())
            .with_file_types(file_types);
        if let Some(name) = &self.default_filename {
            prefs = prefs.with_default_filename(name.trim());
        }
        prefs
    }

    /// Lower-cased hosts reported as dangerous.
    #[must_use]
    pub fn dangerous_hosts(&self) -> Vec<String> {
        self.dangerous_hosts
            .iter()
            .map(|host| host.trim().to_ascii_lowercase())
            .collect()
    }
}

fn validate_dir(key: &'static str, dir: Option<&Path>) -> Result<(), ConfigError> {
    match dir {
        Some(dir) if !dir.is_absolute() => Err(ConfigError::invalid(
            key,
            format!("'{}' must be an absolute path", dir.display()),
        )),
        _ => Ok(()),
    }
}

fn validate_entries<I, S>(key: &'static str, entries: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if entries
        .into_iter()
        .any(|entry| entry.as_ref().trim().trim_start_matches('.').is_empty())
    {
        return Err(ConfigError::invalid(key, "entries must not be empty"));
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/download-target/config.toml`
/// 2. `$HOME/.config/download-target/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(env_var_non_empty_os("XDG_CONFIG_HOME"), env_var_non_empty_os("HOME"))
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg_config_home) = xdg_config_home {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }
    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

/// Default download directory: `$HOME/Downloads`, else `./Downloads`
/// resolved against the working directory.
#[must_use]
pub fn default_download_dir() -> PathBuf {
    download_dir_from(env_var_non_empty_os("HOME"), env::current_dir().ok())
}

fn download_dir_from(home: Option<OsString>, cwd: Option<PathBuf>) -> PathBuf {
    match home {
        Some(home) => PathBuf::from(home).join("Downloads"),
        None => cwd.unwrap_or_default().join("Downloads"),
    }
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config named on the command line, or the default file.
///
/// An explicit path must exist; a missing default file yields defaults.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] for a missing explicit file, or any
/// error of [`PrefsConfig::load`].
pub fn load_config(explicit: Option<&Path>) -> Result<PrefsConfig, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), "loading config");
        return PrefsConfig::load(path);
    }

    match resolve_default_config_path() {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "loading default config");
            PrefsConfig::load(&path)
        }
        _ => Ok(PrefsConfig::default()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PrefsConfig::from_toml_str("").unwrap();
        assert_eq!(config, PrefsConfig::default());

        let prefs = config.to_prefs(Path::new("/home/u/Downloads"));
        assert_eq!(prefs.download_dir(), Path::new("/home/u/Downloads"));
        assert_eq!(prefs.save_file_dir(), PathBuf::from("/home/u/Downloads"));
        assert!(!prefs.prompt_for_download());
        assert_eq!(prefs.default_filename(), "download");
    }

    #[test]
    fn test_full_config_maps_onto_prefs() {
        let raw = r#"
download_dir = "/data/dl"
save_file_dir = "/data/picked"
prompt_for_download = true
auto_open_extensions = [".TXT"]
policy_auto_open_extensions = ["pdf"]
trusted_install_sources = ["store.example.com"]
default_filename = "file"
dangerous_hosts = ["Evil.Example"]

[file_types]
exe = "dangerous"
zip = "allow_on_user_gesture"
"#;
        let config = PrefsConfig::from_toml_str(raw).unwrap();
        let prefs = config.to_prefs(Path::new("/unused"));

        assert_eq!(prefs.download_dir(), Path::new("/data/dl"));
        assert_eq!(prefs.save_file_dir(), PathBuf::from("/data/picked"));
        assert!(prefs.prompt_for_download());
        assert!(prefs.is_auto_open_enabled(Path::new("a.txt")));
        assert!(prefs.is_auto_open_enabled(Path::new("a.pdf")));
        assert_eq!(prefs.default_filename(), "file");
        assert_eq!(
            prefs.file_types().danger_level(Path::new("a.exe")),
            DangerLevel::Dangerous
        );
        assert_eq!(
            prefs.file_types().danger_level(Path::new("a.zip")),
            DangerLevel::AllowOnUserGesture
        );
        assert_eq!(config.dangerous_hosts(), vec!["evil.example".to_string()]);
    }

    #[test]
    fn test_relative_download_dir_is_rejected() {
        let err = PrefsConfig::from_toml_str(r#"download_dir = "dl""#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "download_dir",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_extension_entry_is_rejected() {
        let err = PrefsConfig::from_toml_str(r#"auto_open_extensions = ["."]"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "auto_open_extensions",
                ..
            }
        ));
    }

    #[test]
    fn test_default_filename_with_separator_is_rejected() {
        let err = PrefsConfig::from_toml_str(r#"default_filename = "a/b""#).unwrap_err();
        assert!(err.to_string().contains("default_filename"));
    }

    #[test]
    fn test_unknown_key_is_a_parse_error() {
        let err = PrefsConfig::from_toml_str("concurrency = 4").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unknown_danger_level_is_a_parse_error() {
        let err = PrefsConfig::from_toml_str("[file_types]\nexe = \"scary\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "prompt_for_download = true\n").unwrap();
        let config = PrefsConfig::load(&path).unwrap();
        assert!(config.prompt_for_download);
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_config_path_prefers_xdg_config_home() {
        let path = config_path_from(Some("/xdg".into()), Some("/home/u".into()));
        assert_eq!(
            path,
            Some(PathBuf::from("/xdg/download-target/config.toml"))
        );
        let path = config_path_from(None, Some("/home/u".into()));
        assert_eq!(
            path,
            Some(PathBuf::from("/home/u/.config/download-target/config.toml"))
        );
        assert_eq!(config_path_from(None, None), None);
    }

    #[test]
    fn test_default_download_dir_falls_back_to_cwd() {
        assert_eq!(
            download_dir_from(Some("/home/u".into()), Some(PathBuf::from("/cwd"))),
            PathBuf::from("/home/u/Downloads")
        );
        assert_eq!(
            download_dir_from(None, Some(PathBuf::from("/cwd"))),
            PathBuf::from("/cwd/Downloads")
        );
    }
}
