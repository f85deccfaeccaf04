//! # Bounce Core Library
//!
//! Core engine for Bounce, a focus aid that blocks distracting domains for
//! the length of a declared focus session and lets the user talk their way
//! into short, time-boxed exceptions.
//!
//! ## Architecture
//!
//! - **Rules**: declarative block/allow descriptors handed to an external
//!   rule-matching engine through a batch-update seam
//! - **Storage**: one JSON root record, fetched whole and written back as a
//!   merged partial update; TOML configuration alongside it
//! - **Alarms**: named one-shot timers that drive override expiry
//! - **Reconciliation**: re-derives live rules from persisted intent after
//!   install or restart
//!
//! ## Key Components
//!
//! - [`FocusSessionManager`]: session lifecycle and block rules
//! - [`TemporaryAccessManager`]: time-boxed per-domain overrides
//! - [`ReconciliationController`]: install/startup recovery passes
//! - [`BounceService`]: the message-protocol facade over all three

pub mod access;
pub mod alarms;
pub mod decision;
pub mod domain;
pub mod error;
pub mod messages;
pub mod reconcile;
pub mod rules;
pub mod service;
pub mod session;
pub mod storage;

pub use access::{TemporaryAccessManager, TEMP_ALLOW_ALARM_PREFIX};
pub use alarms::{AlarmScheduler, ManualAlarmScheduler, TokioAlarmScheduler};
pub use decision::{DecisionClient, DecisionRequest, DecisionVerdict};
pub use domain::{normalize_domain, stable_hash};
pub use error::{CoreError, DecisionError, Result, RuleEngineError, StorageError};
pub use messages::{Message, Response};
pub use reconcile::{ReconcilePass, ReconcileReport, ReconciliationController};
pub use rules::{MemoryRuleEngine, Rule, RuleEngine};
pub use service::{run_service, service_channel, BounceService, ServiceHandle};
pub use session::FocusSessionManager;
pub use storage::{
    Config, FocusSession, JsonFileStore, MemoryStore, PersistentState, StateStore, Task,
    TaskStatus,
};
