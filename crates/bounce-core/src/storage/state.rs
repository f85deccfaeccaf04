//! The persisted root record and its stores.
//!
//! All session and override state lives in one JSON-serializable record,
//! fetched whole and written back as a merged partial update. Missing fields
//! default at read time; there is no schema versioning. The store offers no
//! transactional isolation between concurrent writers -- hosts that need it
//! serialize mutations through the service loop instead.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::DecisionVerdict;
use crate::error::StorageError;

/// Assignment pulled from the course feed. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub course: String,
    pub due_at: DateTime<Utc>,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
}

/// A user-declared focus interval and the blacklist it enforces.
///
/// Invariant: when `active` is false, `selected_tasks` and
/// `blacklist_domains` are empty. Sessions are replaced wholesale, never
/// mutated field-by-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub active: bool,
    #[serde(default)]
    pub selected_tasks: Vec<Task>,
    #[serde(default)]
    pub blacklist_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl FocusSession {
    /// The empty, inactive session used on stop and as the default.
    pub fn inactive() -> Self {
        Self {
            active: false,
            selected_tasks: Vec::new(),
            blacklist_domains: Vec::new(),
            started_at: None,
        }
    }
}

impl Default for FocusSession {
    fn default() -> Self {
        Self::inactive()
    }
}

/// Normalized domain -> expiry timestamp (absolute epoch millis).
pub type TemporaryAllows = BTreeMap<String, i64>;

/// The single persisted root record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentState {
    #[serde(default)]
    pub focus_session: FocusSession,
    #[serde(default)]
    pub temporary_allows: TemporaryAllows,
    /// The user's configured blacklist, used to seed new sessions.
    #[serde(default = "default_blacklist")]
    pub blacklist_domains: Vec<String>,
    #[serde(default)]
    pub selected_task_ids: Vec<String>,
    /// Last decision-service verdict, cached for the interstitial UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_decision: Option<DecisionVerdict>,
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            focus_session: FocusSession::inactive(),
            temporary_allows: TemporaryAllows::new(),
            blacklist_domains: default_blacklist(),
            selected_task_ids: Vec::new(),
            last_decision: None,
        }
    }
}

fn default_blacklist() -> Vec<String> {
    vec![
        "youtube.com".to_string(),
        "tiktok.com".to_string(),
        "instagram.com".to_string(),
    ]
}

/// Partial update merged over the current record.
///
/// `None` leaves a field untouched; `last_decision` uses a nested Option so
/// `Some(None)` can clear the cached verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_session: Option<FocusSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporary_allows: Option<TemporaryAllows>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_task_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_decision: Option<Option<DecisionVerdict>>,
}

impl StatePatch {
    pub fn focus_session(session: FocusSession) -> Self {
        Self {
            focus_session: Some(session),
            ..Self::default()
        }
    }

    pub fn temporary_allows(allows: TemporaryAllows) -> Self {
        Self {
            temporary_allows: Some(allows),
            ..Self::default()
        }
    }

    pub fn decision(verdict: DecisionVerdict) -> Self {
        Self {
            last_decision: Some(Some(verdict)),
            ..Self::default()
        }
    }

    pub fn with_cleared_decision(mut self) -> Self {
        self.last_decision = Some(None);
        self
    }

    /// Merge this patch into `state`.
    pub fn apply(self, state: &mut PersistentState) {
        if let Some(session) = self.focus_session {
            state.focus_session = session;
        }
        if let Some(allows) = self.temporary_allows {
            state.temporary_allows = allows;
        }
        if let Some(blacklist) = self.blacklist_domains {
            state.blacklist_domains = blacklist;
        }
        if let Some(ids) = self.selected_task_ids {
            state.selected_task_ids = ids;
        }
        if let Some(decision) = self.last_decision {
            state.last_decision = decision;
        }
    }
}

/// Process-wide state service: full-record read, merged partial write.
pub trait StateStore: Send + Sync {
    /// Fetch the full record, defaults filled in for missing fields.
    fn read(&self) -> Result<PersistentState, StorageError>;

    /// Read-modify-write the full record; returns the merged result.
    fn merge(&self, patch: StatePatch) -> Result<PersistentState, StorageError>;
}

/// In-memory store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<PersistentState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistentState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl StateStore for MemoryStore {
    fn read(&self) -> Result<PersistentState, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn merge(&self, patch: StatePatch) -> Result<PersistentState, StorageError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        patch.apply(&mut state);
        Ok(state.clone())
    }
}

/// File-backed store: one JSON document, written atomically via rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open the store at the default location under [`super::data_dir`].
    pub fn open() -> Result<Self, StorageError> {
        let path = super::data_dir()?.join("state.json");
        Ok(Self { path })
    }

    /// Open the store at a custom path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn load(&self) -> Result<PersistentState, StorageError> {
        if !self.path.exists() {
            return Ok(PersistentState::default());
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| StorageError::ReadFailed {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        serde_json::from_str(&content).map_err(|e| StorageError::ReadFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn persist(&self, state: &PersistentState) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(state).map_err(|e| {
            StorageError::WriteFailed {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| StorageError::WriteFailed {
            path: tmp.clone(),
            message: e.to_string(),
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StorageError::WriteFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}

impl StateStore for JsonFileStore {
    fn read(&self) -> Result<PersistentState, StorageError> {
        self.load()
    }

    fn merge(&self, patch: StatePatch) -> Result<PersistentState, StorageError> {
        let mut state = self.load()?;
        patch.apply(&mut state);
        self.persist(&state)?;
        Ok(state)
    }
}
