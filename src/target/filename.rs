//! Filename synthesis for download targets.
//!
//! This module derives a default filename from the response headers, the
//! page's suggestion, the URL and the sniffed MIME type, and normalizes names
//! proposed by extensions. Nothing here touches the filesystem.

use std::path::{Component, Path, PathBuf};

use url::Url;

use super::file_types::extension_of;
use super::prefs::{DEFAULT_DOWNLOAD_FILENAME, DownloadPrefs};
use super::snapshot::DownloadSnapshot;

/// MIME type of a client certificate handed to the certificate importer.
const USER_CERT_MIME_TYPE: &str = "application/x-x509-user-cert";

/// Filename used for client certificates without a better name.
const USER_CERT_FILENAME: &str = "user.crt";

/// MIME type / preferred extension pairs. The first entry for a MIME type is
/// its preferred extension.
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("text/html", "html"),
    ("text/html", "htm"),
    ("text/plain", "txt"),
    ("text/css", "css"),
    ("text/csv", "csv"),
    ("text/xml", "xml"),
    ("text/javascript", "js"),
    ("application/javascript", "js"),
    ("application/json", "json"),
    ("application/xml", "xml"),
    ("application/pdf", "pdf"),
    ("application/zip", "zip"),
    ("application/gzip", "gz"),
    ("application/x-gzip", "gz"),
    ("application/x-tar", "tar"),
    ("application/x-7z-compressed", "7z"),
    ("application/vnd.rar", "rar"),
    ("application/x-msdownload", "exe"),
    ("application/x-msi", "msi"),
    ("application/x-apple-diskimage", "dmg"),
    ("application/vnd.android.package-archive", "apk"),
    ("application/x-chrome-extension", "crx"),
    ("application/x-x509-user-cert", "crt"),
    ("application/msword", "doc"),
    ("application/vnd.openxmlformats-officedocument.wordprocessingml.document", "docx"),
    ("application/vnd.ms-excel", "xls"),
    ("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", "xlsx"),
    ("image/jpeg", "jpg"),
    ("image/jpeg", "jpeg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
    ("image/bmp", "bmp"),
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
    ("audio/mpeg", "mp3"),
    ("audio/ogg", "ogg"),
    ("audio/wav", "wav"),
];

/// MIME types the browser renders itself without plugins.
const BROWSER_RENDERABLE_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/pdf",
    "application/xhtml+xml",
    "application/xml",
    "image/bmp",
    "image/gif",
    "image/jpeg",
    "image/png",
    "image/svg+xml",
    "image/webp",
    "text/css",
    "text/csv",
    "text/html",
    "text/javascript",
    "text/plain",
    "text/xml",
    "audio/mpeg",
    "audio/ogg",
    "audio/wav",
    "video/mp4",
    "video/webm",
];

/// Builds the default filename for a new (non-forced, non-resumed) download.
///
/// Names explicitly chosen by the server or the page keep their extension;
/// otherwise the extension is corrected from the sniffed MIME type, unless
/// the name is a type that download protection inspects, or the sniffed
/// `text/plain` is just a downgrade of a more specific declared type.
#[must_use]
pub fn candidate_file_name(download: &DownloadSnapshot, prefs: &DownloadPrefs) -> PathBuf {
    let mut suggested = download.suggested_filename.as_str();
    let sniffed = download.mime_type.as_str();
    if suggested.is_empty() && sniffed == USER_CERT_MIME_TYPE {
        suggested = USER_CERT_FILENAME;
    }

    let generated = generate_file_name(
        download.url(),
        &download.content_disposition,
        suggested,
        sniffed,
        prefs.default_filename(),
        false,
    );

    if prefs.file_types().is_checked_binary(&generated) {
        return generated;
    }
    if sniffed.is_empty() || !suggested.is_empty() {
        return generated;
    }
    if parse_content_disposition(&download.content_disposition).is_some() {
        return generated;
    }
    if sniffed == "text/plain" && download.original_mime_type != "text/plain" {
        return generated;
    }

    generate_file_name(
        download.url(),
        "",
        "",
        sniffed,
        prefs.default_filename(),
        true,
    )
}

/// Generates a filename from the available hints.
///
/// Precedence: content-disposition filename, suggested name, last URL path
/// segment, URL host, `default_name`. The result is sanitized and gets an
/// extension derived from `mime_type` when it has none (or always, when
/// `replace_extension` is set and the current one does not fit the type).
#[must_use]
pub fn generate_file_name(
    url: Option<&Url>,
    content_disposition: &str,
    suggested_name: &str,
    mime_type: &str,
    default_name: &str,
    replace_extension: bool,
) -> PathBuf {
    let raw = parse_content_disposition(content_disposition)
        .or_else(|| non_empty(suggested_name))
        .or_else(|| url.and_then(filename_from_url))
        .or_else(|| url.and_then(|u| u.host_str().map(str::to_string)));

    let mut name = raw.map(|n| sanitize_filename(&n)).unwrap_or_default();
    if name.is_empty() {
        name = sanitize_filename(default_name);
    }
    if name.is_empty() {
        name = DEFAULT_DOWNLOAD_FILENAME.to_string();
    }

    PathBuf::from(ensure_extension(&name, mime_type, replace_extension))
}

/// Applies MIME-based extension correction to the leaf of `path`.
///
/// With `ignore_extension` the current extension is replaced when it does
/// not belong to `mime_type`; otherwise an extension is only added when the
/// name has none.
#[must_use]
pub fn generate_safe_file_name(path: &Path, mime_type: &str, ignore_extension: bool) -> PathBuf {
    let Some(leaf) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return path.to_path_buf();
    };
    let fixed = ensure_extension(&sanitize_filename(&leaf), mime_type, ignore_extension);
    path.with_file_name(fixed)
}

/// Re-roots a path suggested by an extension under `download_dir` and
/// corrects its extension.
///
/// Only normal components survive, so the result never escapes the download
/// directory. Local `file:` downloads keep the source file's extension.
/// Otherwise an empty extension, or one matching `current_virtual_path`,
/// is kept and anything else is re-derived from the sniffed MIME type.
#[must_use]
pub fn normalize_suggested_path(
    download_dir: &Path,
    suggested: &Path,
    download: &DownloadSnapshot,
    current_virtual_path: &Path,
) -> PathBuf {
    let mut new_path = download_dir.to_path_buf();
    for component in suggested.components() {
        if let Component::Normal(part) = component {
            let part = sanitize_filename(&part.to_string_lossy());
            if !part.is_empty() {
                new_path.push(part);
            }
        }
    }
    if new_path == download_dir {
        new_path.push(DEFAULT_DOWNLOAD_FILENAME);
    }

    if let Some(source) = download
        .url()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok())
    {
        let ext = source.extension().map(std::ffi::OsStr::to_os_string);
        new_path.set_extension(ext.unwrap_or_default());
        return new_path;
    }

    let new_ext = extension_of(&new_path);
    if new_ext.is_none() || new_ext == extension_of(current_virtual_path) {
        generate_safe_file_name(&new_path, "", false)
    } else {
        generate_safe_file_name(&new_path, &download.mime_type, true)
    }
}

/// Parses a `Content-Disposition` header and returns the bare filename.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example.pdf` (RFC 5987, preferred)
///
/// Directory components in the value are discarded.
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    let lower = header.to_ascii_lowercase();

    if let Some(pos) = lower.find("filename*=") {
        let value = header[pos + 10..].trim();
        // Format: charset'language'encoded_value
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name)
                && let Some(leaf) = leaf_name(&decoded)
            {
                return Some(leaf);
            }
        }
    }

    let pos = lower.find("filename=")?;
    let value = header[pos + 9..].trim();
    let raw = if let Some(stripped) = value.strip_prefix('"') {
        let end = stripped.find('"')?;
        &stripped[..end]
    } else {
        let end = value.find(';').unwrap_or(value.len());
        value[..end].trim()
    };
    leaf_name(raw)
}

/// Makes a filename safe for common filesystems.
///
/// Path separators, reserved characters and control characters become `_`;
/// leading and trailing dots and whitespace are trimmed so the name can not
/// be hidden, relative or silently truncated.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    sanitized
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Preferred extension (without the dot) for a MIME type.
#[must_use]
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    let mime = essence(mime_type);
    MIME_EXTENSIONS
        .iter()
        .find(|(m, _)| *m == mime)
        .map(|(_, ext)| *ext)
}

/// MIME type for a file extension (with or without the dot).
#[must_use]
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    MIME_EXTENSIONS
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(m, _)| *m)
}

/// Returns true if the browser renders `mime_type` without plugins.
#[must_use]
pub fn is_browser_renderable(mime_type: &str) -> bool {
    let mime = essence(mime_type);
    BROWSER_RENDERABLE_MIME_TYPES.contains(&mime.as_str())
}

fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn ensure_extension(name: &str, mime_type: &str, replace: bool) -> String {
    let Some(mime_ext) = extension_for_mime(mime_type) else {
        return name.to_string();
    };
    let current = extension_of(Path::new(name));
    match current {
        None => format!("{name}.{mime_ext}"),
        Some(ext) if replace && !extension_fits_mime(&ext, mime_type) => {
            let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
            format!("{stem}.{mime_ext}")
        }
        Some(_) => name.to_string(),
    }
}

fn extension_fits_mime(ext: &str, mime_type: &str) -> bool {
    let mime = essence(mime_type);
    MIME_EXTENSIONS.iter().any(|(m, e)| *m == mime && *e == ext)
}

fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(last).ok()?;
    non_empty(&decoded)
}

fn leaf_name(value: &str) -> Option<String> {
    let leaf = value.rsplit(['/', '\\']).next().unwrap_or(value).trim();
    non_empty(leaf)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
