//! Error types for target determination.
//!
//! A step that cannot continue returns a [`DeterminationError`]; the driver
//! turns it into the [`InterruptReason`] reported to the host.

use std::path::PathBuf;

use thiserror::Error;

use super::types::{InterruptReason, PathValidationResult};

/// Reasons a determination run stops before producing a target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeterminationError {
    /// No absolute virtual path could be generated, e.g. a transient
    /// download with neither a forced nor an existing path.
    #[error("download has no usable absolute path")]
    NoValidPath,

    /// Mixed-content policy silently blocked the download.
    #[error("download blocked as mixed content")]
    MixedContentBlocked,

    /// Reserving the path of a transient download failed.
    #[error("could not reserve {path}: {result:?}")]
    PathReservationFailed {
        /// Path that was being reserved.
        path: PathBuf,
        /// Validation result reported by the reservation.
        result: PathValidationResult,
    },

    /// The user dismissed the location prompt.
    #[error("user canceled the location prompt for {path}")]
    ConfirmationCanceled {
        /// Path offered in the prompt.
        path: PathBuf,
    },

    /// Mapping the virtual path to a local path produced nothing.
    #[error("no local path for {virtual_path}")]
    EmptyLocalPath {
        /// Virtual path that could not be mapped.
        virtual_path: PathBuf,
    },

    /// The tracked download was destroyed while the run was in flight.
    #[error("download destroyed during target determination")]
    DownloadDestroyed,
}

impl DeterminationError {
    /// Creates a reservation failure.
    #[must_use]
    pub fn reservation_failed(path: impl Into<PathBuf>, result: PathValidationResult) -> Self {
        Self::PathReservationFailed {
            path: path.into(),
            result,
        }
    }

    /// Creates a prompt cancellation.
    #[must_use]
    pub fn confirmation_canceled(path: impl Into<PathBuf>) -> Self {
        Self::ConfirmationCanceled { path: path.into() }
    }

    /// Creates a local path failure.
    #[must_use]
    pub fn empty_local_path(virtual_path: impl Into<PathBuf>) -> Self {
        Self::EmptyLocalPath {
            virtual_path: virtual_path.into(),
        }
    }

    /// Returns the interrupt reason reported for this error.
    #[must_use]
    pub fn interrupt_reason(&self) -> InterruptReason {
        match self {
            Self::NoValidPath
            | Self::PathReservationFailed { .. }
            | Self::ConfirmationCanceled { .. }
            | Self::DownloadDestroyed => InterruptReason::UserCanceled,
            Self::MixedContentBlocked => InterruptReason::FileBlocked,
            Self::EmptyLocalPath { .. } => InterruptReason::FileFailed,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub fn cancel_reason(&self) -> &'static str {
        match self {
            Self::NoValidPath => "no_valid_path",
            Self::MixedContentBlocked => "mixed_content_blocked",
            Self::PathReservationFailed { .. } => "path_reservation_failed",
            Self::ConfirmationCanceled { .. } => "confirmation_canceled",
            Self::EmptyLocalPath { .. } => "empty_local_path",
            Self::DownloadDestroyed => "download_destroyed",
        }
    }
}

/// Failure of a visit-history lookup.
///
/// The run treats any failure as "no prior visits".
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The history backend is not available.
    #[error("history backend unavailable")]
    Unavailable,

    /// The lookup itself failed.
    #[error("history lookup failed for {host}: {message}")]
    Lookup {
        /// Host that was queried.
        host: String,
        /// Backend message.
        message: String,
    },
}
