//! Scripted `TargetDelegate` for integration tests.
//!
//! Every method records its call and the arguments it saw. Replies come from
//! the script; a method can be held until the test releases it, which lets
//! tests cancel a run while a request is outstanding.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use download_target::target::{
    Confirmation, ConfirmationReason, ConfirmationResult, ConflictAction, DangerType,
    DownloadSnapshot, ExtensionSuggestion, HistoryError, LocalPath, MixedContentStatus,
    PathValidationResult, Reservation, TargetDelegate, VisitCount, VisitHistory,
};
use tokio::sync::oneshot;
use url::Url;

pub const MIXED_CONTENT: &str = "mixed_content_status";
pub const NOTIFY_EXTENSIONS: &str = "notify_extensions";
pub const RESERVE: &str = "reserve_virtual_path";
pub const CONFIRM: &str = "request_confirmation";
pub const LOCAL_PATH: &str = "determine_local_path";
pub const MIME_TYPE: &str = "file_mime_type";
pub const HANDLED_SAFELY: &str = "is_handled_safely";
pub const CHECK_URL: &str = "check_download_url";
pub const VISITS: &str = "visible_visit_count_to_host";

/// Arguments of one reservation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveCall {
    pub path: PathBuf,
    pub create_directory: bool,
    pub conflict_action: ConflictAction,
}

#[derive(Debug, Default)]
struct Record {
    calls: HashMap<&'static str, usize>,
    reservations: Vec<ReserveCall>,
    confirmation_reasons: Vec<ConfirmationReason>,
    held: HashMap<&'static str, oneshot::Receiver<()>>,
}

/// Replies the mock gives.
#[derive(Debug, Clone)]
pub struct Script {
    pub mixed_content: MixedContentStatus,
    pub extension: ExtensionSuggestion,
    /// Reservation results consumed in order; success echoing the path
    /// once exhausted.
    pub reservations: VecDeque<(PathValidationResult, Option<PathBuf>)>,
    /// Prompt replies consumed in order; `Confirmed` with the offered path
    /// once exhausted.
    pub confirmations: VecDeque<(ConfirmationResult, Option<PathBuf>)>,
    /// `None` maps the virtual path onto itself.
    pub local_path: Option<LocalPath>,
    pub mime_type: Option<String>,
    pub handled_safely: bool,
    pub url_danger: DangerType,
    /// `None` means no history collaborator.
    pub history: Option<MockHistory>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            mixed_content: MixedContentStatus::Safe,
            extension: ExtensionSuggestion::default(),
            reservations: VecDeque::new(),
            confirmations: VecDeque::new(),
            local_path: None,
            mime_type: None,
            handled_safely: false,
            url_danger: DangerType::NotDangerous,
            history: None,
        }
    }
}

/// History answering every lookup with the same visit count.
#[derive(Debug, Clone, Default)]
pub struct MockHistory {
    /// `None` makes the lookup fail.
    pub visits: Option<VisitCount>,
    calls: std::sync::Arc<Mutex<usize>>,
}

impl MockHistory {
    pub fn new(visits: Option<VisitCount>) -> Self {
        Self {
            visits,
            calls: std::sync::Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl VisitHistory for MockHistory {
    async fn visible_visit_count_to_host(&self, url: &Url) -> Result<VisitCount, HistoryError> {
        *self.calls.lock().unwrap() += 1;
        self.visits.ok_or_else(|| HistoryError::Lookup {
            host: url.host_str().unwrap_or_default().to_string(),
            message: "scripted failure".to_string(),
        })
    }
}

/// Scripted delegate with call accounting.
#[derive(Debug, Default)]
pub struct MockDelegate {
    script: Mutex<Script>,
    record: Mutex<Record>,
    history: Option<MockHistory>,
}

impl MockDelegate {
    pub fn new(script: Script) -> Self {
        let history = script.history.clone();
        Self {
            script: Mutex::new(script),
            record: Mutex::default(),
            history,
        }
    }

    /// Holds the next reply of `method` until the returned sender fires or
    /// is dropped.
    pub fn hold(&self, method: &'static str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.record().held.insert(method, rx);
        tx
    }

    pub fn calls(&self, method: &str) -> usize {
        self.record().calls.get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.record().calls.values().sum()
    }

    pub fn reservations(&self) -> Vec<ReserveCall> {
        self.record().reservations.clone()
    }

    pub fn confirmation_reasons(&self) -> Vec<ConfirmationReason> {
        self.record().confirmation_reasons.clone()
    }

    pub fn history(&self) -> Option<&MockHistory> {
        self.history.as_ref()
    }

    /// Waits until `method` has been entered at least once.
    pub async fn wait_for_call(&self, method: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls(method) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    fn record(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    async fn enter(&self, method: &'static str) {
        let held = {
            let mut record = self.record();
            *record.calls.entry(method).or_default() += 1;
            record.held.remove(method)
        };
        if let Some(gate) = held {
            let _ = gate.await;
        }
    }
}

#[async_trait]
impl TargetDelegate for MockDelegate {
    async fn mixed_content_status(
        &self,
        _download: &DownloadSnapshot,
        _virtual_path: &Path,
    ) -> MixedContentStatus {
        self.enter(MIXED_CONTENT).await;
        self.script().mixed_content
    }

    async fn notify_extensions(
        &self,
        _download: &DownloadSnapshot,
        _virtual_path: &Path,
    ) -> ExtensionSuggestion {
        self.enter(NOTIFY_EXTENSIONS).await;
        self.script().extension.clone()
    }

    async fn reserve_virtual_path(
        &self,
        _download: &DownloadSnapshot,
        virtual_path: &Path,
        create_directory: bool,
        conflict_action: ConflictAction,
    ) -> Reservation {
        self.record().reservations.push(ReserveCall {
            path: virtual_path.to_path_buf(),
            create_directory,
            conflict_action,
        });
        self.enter(RESERVE).await;
        match self.script().reservations.pop_front() {
            Some((result, path)) => {
                Reservation::new(result, path.unwrap_or_else(|| virtual_path.to_path_buf()))
            }
            None => Reservation::new(PathValidationResult::Success, virtual_path),
        }
    }

    async fn request_confirmation(
        &self,
        _download: &DownloadSnapshot,
        virtual_path: &Path,
        reason: ConfirmationReason,
    ) -> Confirmation {
        self.record().confirmation_reasons.push(reason);
        self.enter(CONFIRM).await;
        match self.script().confirmations.pop_front() {
            Some((result, path)) => {
                Confirmation::new(result, path.unwrap_or_else(|| virtual_path.to_path_buf()))
            }
            None => Confirmation::new(ConfirmationResult::Confirmed, virtual_path),
        }
    }

    async fn determine_local_path(
        &self,
        _download: &DownloadSnapshot,
        virtual_path: &Path,
    ) -> LocalPath {
        self.enter(LOCAL_PATH).await;
        self.script()
            .local_path
            .clone()
            .unwrap_or_else(|| LocalPath::identity(virtual_path))
    }

    async fn file_mime_type(&self, _local_path: &Path) -> Option<String> {
        self.enter(MIME_TYPE).await;
        self.script().mime_type.clone()
    }

    async fn is_handled_safely(&self, _local_path: &Path, _mime_type: &str) -> bool {
        self.enter(HANDLED_SAFELY).await;
        self.script().handled_safely
    }

    async fn check_download_url(
        &self,
        _download: &DownloadSnapshot,
        _virtual_path: &Path,
    ) -> DangerType {
        self.enter(CHECK_URL).await;
        self.script().url_danger
    }

    fn visit_history(&self) -> Option<&dyn VisitHistory> {
        self.history.as_ref().map(|history| history as &dyn VisitHistory)
    }
}
