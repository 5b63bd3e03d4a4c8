//! Target determination state machine.
//!
//! A run walks the steps of [`Step`] in order, suspending at most once per
//! step on a [`TargetDelegate`] call. It ends by consuming its state into a
//! [`TargetResult`]. Destroying the tracked download through
//! [`CancelHandle::cancel`] pre-empts whatever step is outstanding.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use super::confirmation::needs_confirmation;
use super::danger::{danger_level, visited_before};
use super::delegate::TargetDelegate;
use super::error::DeterminationError;
use super::filename::{candidate_file_name, is_browser_renderable, normalize_suggested_path};
use super::intermediate::{determine_intermediate_path, is_content_uri};
use super::prefs::DownloadPrefs;
use super::snapshot::DownloadSnapshot;
use super::state::{Step, WorkflowState};
use super::types::{
    ConfirmationReason, ConfirmationResult, ConflictAction, DangerLevel, DangerType,
    InterruptReason, MixedContentStatus, PathValidationResult, TargetDisposition,
};

/// Final decisions of a determination run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    /// Where the finished file ends up.
    pub target_path: PathBuf,
    /// Working filename while bytes are arriving.
    pub intermediate_path: PathBuf,
    /// `Prompt` if the user chose the path, else `Overwrite`.
    pub target_disposition: TargetDisposition,
    /// Danger verdict.
    pub danger_type: DangerType,
    /// Policy-adjusted danger level.
    pub danger_level: DangerLevel,
    /// Sniffed MIME type of the local file.
    pub mime_type: Option<String>,
    /// The browser can display the file type safely.
    pub is_filetype_handled_safely: bool,
    /// Mixed-content classification.
    pub mixed_content_status: MixedContentStatus,
    /// `None` on success.
    pub interrupt_reason: InterruptReason,
}

impl TargetResult {
    /// Returns true if the run produced a usable target.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.interrupt_reason == InterruptReason::None
    }
}

/// Signals destruction of the tracked download to a running determination.
///
/// Dropping the handle without calling [`CancelHandle::cancel`] detaches
/// the run; it still completes normally.
#[derive(Debug)]
pub struct CancelHandle {
    tx: oneshot::Sender<()>,
}

impl CancelHandle {
    /// Reports the tracked download as destroyed.
    ///
    /// The run completes with [`InterruptReason::UserCanceled`] unless it
    /// already finished.
    pub fn cancel(self) {
        // Err means the run already finished.
        let _ = self.tx.send(());
    }
}

/// Receiving side of a [`CancelHandle`].
#[derive(Debug)]
pub struct CancelSignal {
    rx: Option<oneshot::Receiver<()>>,
}

impl CancelSignal {
    /// Creates a connected handle and signal.
    #[must_use]
    pub fn pair() -> (CancelHandle, Self) {
        let (tx, rx) = oneshot::channel();
        (CancelHandle { tx }, Self { rx: Some(rx) })
    }

    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Resolves once the download is destroyed; pending forever otherwise.
    async fn destroyed(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.await.is_ok() {
                return;
            }
            // Handle dropped: detached.
            self.rx = None;
        }
        std::future::pending::<()>().await;
    }
}

/// One determination run over a single download.
pub struct TargetDeterminer {
    download: Arc<DownloadSnapshot>,
    prefs: Arc<DownloadPrefs>,
    delegate: Arc<dyn TargetDelegate>,
    state: WorkflowState,
}

impl std::fmt::Debug for TargetDeterminer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetDeterminer")
            .field("download", &self.download)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TargetDeterminer {
    /// Creates a run for `download`.
    ///
    /// `initial_virtual_path` is the path chosen by a previous attempt, if
    /// any; together with a non-`None` last interrupt reason it makes the run
    /// a resumption.
    #[must_use]
    pub fn new(
        download: Arc<DownloadSnapshot>,
        initial_virtual_path: Option<PathBuf>,
        conflict_action: ConflictAction,
        prefs: Arc<DownloadPrefs>,
        delegate: Arc<dyn TargetDelegate>,
    ) -> Self {
        let state = WorkflowState::new(&download, initial_virtual_path, conflict_action);
        Self {
            download,
            prefs,
            delegate,
            state,
        }
    }

    /// Spawns a run on the current tokio runtime.
    ///
    /// `on_complete` is called exactly once, from the spawned task, so it
    /// never runs before `start` returns. The runtime is the execution
    /// context of the run: on a multi-thread runtime the callback may run on
    /// any worker thread. Use [`TargetDeterminer::start_local`] to keep it on
    /// the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<F>(
        download: Arc<DownloadSnapshot>,
        initial_virtual_path: Option<PathBuf>,
        conflict_action: ConflictAction,
        prefs: Arc<DownloadPrefs>,
        delegate: Arc<dyn TargetDelegate>,
        on_complete: F,
    ) -> CancelHandle
    where
        F: FnOnce(TargetResult) + Send + 'static,
    {
        let (handle, signal) = CancelSignal::pair();
        let determiner = Self::new(
            download,
            initial_virtual_path,
            conflict_action,
            prefs,
            delegate,
        );
        tokio::spawn(async move {
            let result = determiner.run(signal).await;
            on_complete(result);
        });
        handle
    }

    /// Spawns a run on the current [`tokio::task::LocalSet`].
    ///
    /// The run and `on_complete` stay on the thread driving the local set,
    /// so the callback does not need to be `Send`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a `LocalSet`.
    pub fn start_local<F>(
        download: Arc<DownloadSnapshot>,
        initial_virtual_path: Option<PathBuf>,
        conflict_action: ConflictAction,
        prefs: Arc<DownloadPrefs>,
        delegate: Arc<dyn TargetDelegate>,
        on_complete: F,
    ) -> CancelHandle
    where
        F: FnOnce(TargetResult) + 'static,
    {
        let (handle, signal) = CancelSignal::pair();
        let determiner = Self::new(
            download,
            initial_virtual_path,
            conflict_action,
            prefs,
            delegate,
        );
        tokio::task::spawn_local(async move {
            let result = determiner.run(signal).await;
            on_complete(result);
        });
        handle
    }

    /// Runs to completion without a cancellation source.
    pub async fn determine(self) -> TargetResult {
        self.run(CancelSignal::never()).await
    }

    /// Runs to completion or until `cancel` fires.
    #[instrument(skip_all, fields(url = ?self.download.url().map(url::Url::as_str)))]
    pub async fn run(mut self, mut cancel: CancelSignal) -> TargetResult {
        let outcome = self.drive(&mut cancel).await;
        self.finish(outcome)
    }

    /// Steps until the state reaches a terminal step.
    async fn drive(&mut self, cancel: &mut CancelSignal) -> Result<(), DeterminationError> {
        while !self.state.next_step.is_terminal() {
            let step = self.state.next_step;
            let outcome = tokio::select! {
                biased;
                () = cancel.destroyed() => Err(DeterminationError::DownloadDestroyed),
                next = self.run_step(step) => next,
            };
            match outcome {
                Ok(next) => self.state.next_step = next,
                Err(error) => {
                    self.state.next_step = Step::Cancelled;
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    async fn run_step(&mut self, step: Step) -> Result<Step, DeterminationError> {
        match step {
            Step::GeneratePath => self.generate_target_path(),
            Step::SetMixedContentStatus => self.set_mixed_content_status().await,
            Step::NotifyExtensions => Ok(self.notify_extensions().await),
            Step::ReserveVirtualPath => self.reserve_virtual_path().await,
            Step::RequestConfirmation => self.request_confirmation().await,
            Step::DetermineLocalPath => self.determine_local_path().await,
            Step::DetermineMimeType => Ok(self.determine_mime_type().await),
            Step::DetermineIfHandledSafely => Ok(self.determine_if_handled_safely().await),
            Step::CheckDownloadUrl => Ok(self.check_download_url().await),
            Step::CheckVisitedReferrerBefore => Ok(self.check_visited_referrer_before().await),
            Step::DetermineIntermediatePath => Ok(self.determine_intermediate_path()),
            Step::Complete | Step::Cancelled => Ok(step),
        }
    }

    fn generate_target_path(&mut self) -> Result<Step, DeterminationError> {
        let next = Step::SetMixedContentStatus;
        let download = Arc::clone(&self.download);
        let forced = download.forced_path();
        let state = &mut self.state;

        if download.is_transient {
            if let Some(forced) = forced {
                debug!(event = "use_forced_path", transient = true, "generated path");
                state.virtual_path = forced.to_path_buf();
            } else if !state.virtual_path.as_os_str().is_empty() {
                debug!(event = "use_existing_virtual_path", transient = true, "generated path");
            } else {
                debug!(event = "no_valid_path", transient = true, "generated path");
                return Err(DeterminationError::NoValidPath);
            }
            state.conflict_action = ConflictAction::Overwrite;
            return self.require_absolute_virtual_path(next);
        }

        let no_prompt_needed =
            state.has_prompted_for_path(&download) || is_content_uri(&state.virtual_path);

        match forced {
            None if !state.virtual_path.as_os_str().is_empty() && no_prompt_needed => {
                state.confirmation_reason = needs_confirmation(
                    &download,
                    state.is_resumption,
                    &self.prefs,
                    &state.virtual_path,
                );
                state.conflict_action = ConflictAction::Overwrite;
                debug!(event = "use_existing_virtual_path", "generated path");
            }
            None => {
                let filename = candidate_file_name(&download, &self.prefs);
                state.confirmation_reason =
                    needs_confirmation(&download, state.is_resumption, &self.prefs, &filename);
                let directory = if state.confirmation_reason.is_required() {
                    debug!(event = "use_last_prompt_directory", "generated path");
                    self.prefs.save_file_dir()
                } else {
                    debug!(event = "use_default_download_directory", "generated path");
                    self.prefs.download_dir().to_path_buf()
                };
                state.virtual_path = directory.join(filename);
                state.should_notify_extensions = true;
            }
            Some(forced) => {
                state.conflict_action = ConflictAction::Overwrite;
                state.virtual_path = forced.to_path_buf();
                debug!(event = "use_forced_path", "generated path");
            }
        }
        debug!(virtual_path = %state.virtual_path.display(), "generated virtual path");
        self.require_absolute_virtual_path(next)
    }

    /// Virtual paths are absolute filesystem paths or content URIs.
    fn require_absolute_virtual_path(&self, next: Step) -> Result<Step, DeterminationError> {
        let path = &self.state.virtual_path;
        if path.is_absolute() || is_content_uri(path) {
            return Ok(next);
        }
        debug!(event = "no_valid_path", virtual_path = %path.display(), "relative path rejected");
        Err(DeterminationError::NoValidPath)
    }

    #[instrument(level = "debug", skip(self))]
    async fn set_mixed_content_status(&mut self) -> Result<Step, DeterminationError> {
        let status = self
            .delegate
            .mixed_content_status(&self.download, &self.state.virtual_path)
            .await;
        self.state.mixed_content_status = status;
        if status == MixedContentStatus::SilentBlock {
            return Err(DeterminationError::MixedContentBlocked);
        }
        Ok(Step::NotifyExtensions)
    }

    #[instrument(level = "debug", skip(self))]
    async fn notify_extensions(&mut self) -> Step {
        let next = Step::ReserveVirtualPath;
        if !self.state.should_notify_extensions || !self.download.is_in_progress() {
            return next;
        }

        let suggestion = self
            .delegate
            .notify_extensions(&self.download, &self.state.virtual_path)
            .await;
        debug!(suggested = %suggestion.path.display(), "extension suggested path");

        if !suggestion.path.as_os_str().is_empty() {
            self.state.virtual_path = normalize_suggested_path(
                self.prefs.download_dir(),
                &suggestion.path,
                &self.download,
                &self.state.virtual_path,
            );
            self.state.create_target_directory = true;
        }
        if suggestion.conflict_action != ConflictAction::Uniquify {
            self.state.conflict_action = suggestion.conflict_action;
        }
        next
    }

    #[instrument(level = "debug", skip(self))]
    async fn reserve_virtual_path(&mut self) -> Result<Step, DeterminationError> {
        let next = Step::RequestConfirmation;
        if !self.download.is_in_progress() {
            return Ok(next);
        }

        let reservation = self
            .delegate
            .reserve_virtual_path(
                &self.download,
                &self.state.virtual_path,
                self.state.create_target_directory,
                self.state.conflict_action,
            )
            .await;
        debug!(path = %reservation.path.display(), result = ?reservation.result, "reserved path");

        if self.download.is_transient {
            return match reservation.result {
                PathValidationResult::Success | PathValidationResult::SameAsSource => Ok(next),
                PathValidationResult::PathNotWritable
                | PathValidationResult::NameTooLong
                | PathValidationResult::Conflict => Err(DeterminationError::reservation_failed(
                    &self.state.virtual_path,
                    reservation.result,
                )),
            };
        }

        self.state.virtual_path = reservation.path;
        match reservation.result {
            PathValidationResult::Success | PathValidationResult::SameAsSource => {}
            PathValidationResult::PathNotWritable => {
                self.state.confirmation_reason = ConfirmationReason::TargetPathNotWriteable;
            }
            PathValidationResult::NameTooLong => {
                self.state.confirmation_reason = ConfirmationReason::NameTooLong;
            }
            PathValidationResult::Conflict => {
                self.state.confirmation_reason = ConfirmationReason::TargetConflict;
            }
        }
        Ok(next)
    }

    #[instrument(level = "debug", skip(self))]
    async fn request_confirmation(&mut self) -> Result<Step, DeterminationError> {
        let next = Step::DetermineLocalPath;
        if !self.download.is_in_progress() {
            return Ok(next);
        }

        let state = &mut self.state;
        if state.is_checking_dialog_confirmed_path
            && matches!(
                state.confirmation_reason,
                ConfirmationReason::Preference | ConfirmationReason::None
            )
        {
            state.is_checking_dialog_confirmed_path = false;
            return Ok(next);
        }
        if !state.confirmation_reason.is_required() {
            return Ok(next);
        }

        let confirmation = self
            .delegate
            .request_confirmation(&self.download, &state.virtual_path, state.confirmation_reason)
            .await;
        debug!(path = %confirmation.path.display(), result = ?confirmation.result, "user selected path");
        state.is_checking_dialog_confirmed_path = false;

        let mut next = next;
        match confirmation.result {
            ConfirmationResult::Canceled => {
                return Err(DeterminationError::confirmation_canceled(&state.virtual_path));
            }
            ConfirmationResult::ContinueWithoutConfirmation => {
                state.confirmation_reason = ConfirmationReason::None;
            }
            ConfirmationResult::ConfirmedWithDialog => {
                state.is_checking_dialog_confirmed_path = true;
                state.confirmation_reason = ConfirmationReason::None;
                next = Step::ReserveVirtualPath;
            }
            ConfirmationResult::Confirmed => {}
        }

        if !confirmation.path.as_os_str().is_empty() {
            state.virtual_path = confirmation.path;
        }
        if let Some(dir) = state.virtual_path.parent() {
            self.prefs.set_save_file_dir(dir);
        }
        Ok(next)
    }

    #[instrument(level = "debug", skip(self))]
    async fn determine_local_path(&mut self) -> Result<Step, DeterminationError> {
        let local = self
            .delegate
            .determine_local_path(&self.download, &self.state.virtual_path)
            .await;
        debug!(local_path = %local.path.display(), "local path");
        if local.path.as_os_str().is_empty() {
            return Err(DeterminationError::empty_local_path(&self.state.virtual_path));
        }

        let state = &mut self.state;
        state.local_path = local.path;
        if is_content_uri(&state.local_path)
            && !is_content_uri(&state.virtual_path)
            && let Some(name) = local.display_name
        {
            state.virtual_path = match state.virtual_path.parent() {
                Some(dir) => dir.join(name),
                None => PathBuf::from(name),
            };
        }
        Ok(Step::DetermineMimeType)
    }

    #[instrument(level = "debug", skip(self))]
    async fn determine_mime_type(&mut self) -> Step {
        let state = &mut self.state;
        if state.virtual_path == state.local_path || is_content_uri(&state.local_path) {
            state.mime_type = self
                .delegate
                .file_mime_type(&state.local_path)
                .await
                .filter(|mime| !mime.is_empty());
            debug!(mime_type = ?state.mime_type, "MIME type");
        }
        Step::DetermineIfHandledSafely
    }

    #[instrument(level = "debug", skip(self))]
    async fn determine_if_handled_safely(&mut self) -> Step {
        let next = Step::CheckDownloadUrl;
        let state = &mut self.state;
        let Some(mime_type) = state.mime_type.as_deref() else {
            return next;
        };
        state.is_filetype_handled_safely = if is_browser_renderable(mime_type) {
            true
        } else {
            self.delegate
                .is_handled_safely(&state.local_path, mime_type)
                .await
        };
        next
    }

    #[instrument(level = "debug", skip(self))]
    async fn check_download_url(&mut self) -> Step {
        let next = Step::CheckVisitedReferrerBefore;
        if self.state.danger_type == DangerType::UserValidated {
            return next;
        }
        self.state.danger_type = self
            .delegate
            .check_download_url(&self.download, &self.state.virtual_path)
            .await;
        debug!(danger_type = ?self.state.danger_type, "URL check result");
        next
    }

    #[instrument(level = "debug", skip(self))]
    async fn check_visited_referrer_before(&mut self) -> Step {
        let next = Step::DetermineIntermediatePath;
        if !self.state.danger_type.depends_on_file_type() {
            return next;
        }

        self.state.danger_level = danger_level(&self.download, &self.state, &self.prefs, false);
        if self.state.danger_level == DangerLevel::NotDangerous {
            return next;
        }

        if self.state.danger_level == DangerLevel::AllowOnUserGesture
            && let Some(history) = self.delegate.visit_history()
            && let Some(referrer) = self.download.referrer_url.as_ref()
        {
            let visits = match history.visible_visit_count_to_host(referrer).await {
                Ok(visits) => Some(visits),
                Err(error) => {
                    debug!(error = %error, "visit lookup failed; assuming no prior visits");
                    None
                }
            };
            let visited = visited_before(visits.as_ref(), Local::now());
            self.state.danger_level =
                danger_level(&self.download, &self.state, &self.prefs, visited);
            if self.state.danger_level != DangerLevel::NotDangerous {
                self.promote_to_dangerous_file();
            }
            return next;
        }

        self.promote_to_dangerous_file();
        next
    }

    fn promote_to_dangerous_file(&mut self) {
        if self.state.danger_type == DangerType::NotDangerous {
            self.state.danger_type = DangerType::DangerousFile;
        }
    }

    fn determine_intermediate_path(&mut self) -> Step {
        let mut rng = rand::thread_rng();
        self.state.intermediate_path =
            determine_intermediate_path(&self.download, &self.state, &mut rng);
        Step::Complete
    }

    fn finish(self, outcome: Result<(), DeterminationError>) -> TargetResult {
        let interrupt_reason = match &outcome {
            Ok(()) => InterruptReason::None,
            Err(error) => {
                warn!(
                    reason = error.cancel_reason(),
                    error = %error,
                    "target determination stopped"
                );
                error.interrupt_reason()
            }
        };

        let target_disposition = if self.state.has_prompted_for_path(&self.download)
            || self.state.confirmation_reason.is_required()
        {
            TargetDisposition::Prompt
        } else {
            TargetDisposition::Overwrite
        };

        let state = self.state;
        let last_step = state.next_step;
        let result = TargetResult {
            target_path: state.local_path,
            intermediate_path: state.intermediate_path,
            target_disposition,
            danger_type: state.danger_type,
            danger_level: state.danger_level,
            mime_type: state.mime_type,
            is_filetype_handled_safely: state.is_filetype_handled_safely,
            mixed_content_status: state.mixed_content_status,
            interrupt_reason,
        };
        info!(
            target = %result.target_path.display(),
            intermediate = %result.intermediate_path.display(),
            disposition = ?result.target_disposition,
            danger_type = ?result.danger_type,
            danger_level = ?result.danger_level,
            interrupt_reason = ?result.interrupt_reason,
            step = ?last_step,
            "target determined"
        );
        result
    }
}
