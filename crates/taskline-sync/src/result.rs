//! Outcomes reported by the sync engine.

use serde::Serialize;

/// Why a request was turned away without touching the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Connectivity reports offline.
    Offline,
    /// Another pass holds the single-flight guard.
    AlreadySyncing,
}

impl SkipReason {
    /// Message placed in the result's error list.
    pub fn message(self) -> &'static str {
        match self {
            Self::Offline => "sync skipped: offline",
            Self::AlreadySyncing => "sync skipped: a sync pass is already running",
        }
    }
}

/// Outcome of one push pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// `false` when the pass was rejected or could not read its queue.
    pub success: bool,
    /// Rows whose remote call succeeded.
    pub synced_tasks: usize,
    /// One entry per failed row (`"<op> <id>: <error>"`) or pass-level failure.
    pub errors: Vec<String>,
    /// Set when the pass never started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl SyncResult {
    pub(crate) fn started() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub(crate) fn rejected(reason: SkipReason) -> Self {
        Self {
            success: false,
            synced_tasks: 0,
            errors: vec![reason.message().to_string()],
            skipped: Some(reason),
        }
    }

    pub(crate) fn failed(message: String) -> Self {
        Self {
            success: false,
            synced_tasks: 0,
            errors: vec![message],
            skipped: None,
        }
    }

    /// Whether the pass ran and every row went through.
    pub fn is_clean(&self) -> bool {
        self.success && self.errors.is_empty()
    }
}

/// Outcome of a pull.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResult {
    /// `false` when the pull was skipped or the remote list could not be fetched.
    pub success: bool,
    /// Remote rows written to the local store.
    pub pulled: usize,
    /// Skip or fetch failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// One entry per remote row that could not be applied (`"apply <id>: <error>"`).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Set when the pull never started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl PullResult {
    pub(crate) fn started() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub(crate) fn rejected(reason: SkipReason) -> Self {
        Self {
            error: Some(reason.message().to_string()),
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub(crate) fn failed(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }

    /// Whether the list was fetched and every row was applied.
    pub fn is_clean(&self) -> bool {
        self.success && self.errors.is_empty()
    }
}

/// Summary of the most recent completed pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Completion time, ms since epoch.
    pub finished_at: i64,
    /// Whether the pass succeeded.
    pub success: bool,
    /// Rows pushed.
    pub synced_tasks: usize,
    /// Rows (or pass-level failures) that errored.
    pub error_count: usize,
}

/// Point-in-time view of the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Latest connectivity state.
    pub online: bool,
    /// Whether a pass is running.
    pub syncing: bool,
    /// Rows waiting to be pushed.
    pub pending: usize,
    /// Last completed pass, if any.
    pub last_sync: Option<SyncSummary>,
}
