//! Focus session lifecycle.
//!
//! Owns the active/inactive state of a focus session and keeps the block-rule
//! range in step with it. The persisted session and the live rules are two
//! separate effects with no compensating rollback: a rule-batch failure after
//! the state write leaves them diverged until the next reconciliation pass.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::normalize_domain;
use crate::error::Result;
use crate::rules::{block_rules_for, is_block_rule_id, RuleEngine};
use crate::storage::{FocusSession, StatePatch, StateStore, Task};

/// Manages the focus session and its derived block rules.
pub struct FocusSessionManager {
    store: Arc<dyn StateStore>,
    engine: Arc<dyn RuleEngine>,
    interstitial_url: String,
}

impl FocusSessionManager {
    pub fn new(
        store: Arc<dyn StateStore>,
        engine: Arc<dyn RuleEngine>,
        interstitial_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            engine,
            interstitial_url: interstitial_url.into(),
        }
    }

    /// Begin a session: persist it, then install its block rules.
    ///
    /// The state write is issued before the rule batch so a concurrent
    /// reconciliation pass observes either the old or the new intent --
    /// never live rules for a session that was not persisted.
    ///
    /// The service pairs this with clearing all temporary allows; a fresh
    /// session invalidates prior overrides.
    pub fn start(&self, tasks: Vec<Task>, domains: Vec<String>) -> Result<FocusSession> {
        let blacklist: Vec<String> = domains.iter().map(|d| normalize_domain(d)).collect();
        let session = FocusSession {
            active: true,
            selected_tasks: tasks,
            blacklist_domains: blacklist,
            started_at: Some(Utc::now()),
        };

        self.store
            .merge(StatePatch::focus_session(session.clone()))?;
        self.apply_focus_rules(&session)?;

        info!(
            domains = session.blacklist_domains.len(),
            tasks = session.selected_tasks.len(),
            "focus session started"
        );
        Ok(session)
    }

    /// End the session: persist the inactive session, drop its block rules,
    /// and clear the cached decision verdict.
    pub fn stop(&self) -> Result<FocusSession> {
        let session = FocusSession::inactive();
        self.store.merge(
            StatePatch::focus_session(session.clone()).with_cleared_decision(),
        )?;
        self.apply_focus_rules(&session)?;

        info!("focus session stopped");
        Ok(session)
    }

    /// The persisted session, unchanged.
    pub fn focus_state(&self) -> Result<FocusSession> {
        Ok(self.store.read()?.focus_session)
    }

    /// Replace the entire block-rule range with the set derived from
    /// `session`, in a single batch.
    pub fn apply_focus_rules(&self, session: &FocusSession) -> Result<()> {
        let existing = self.engine.list_rules()?;
        let remove: Vec<i32> = existing
            .iter()
            .map(|r| r.id)
            .filter(|id| is_block_rule_id(*id))
            .collect();
        let add = block_rules_for(session, &self.interstitial_url);
        self.engine.update_rules(&remove, add)?;
        Ok(())
    }
}
