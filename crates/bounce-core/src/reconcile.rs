//! Startup and install reconciliation.
//!
//! Rule state must match persisted intent after every process boundary:
//! fresh install, browser restart, unclean shutdown. Temporary allows are
//! never restored across a restart -- their timers did not survive, and a
//! silently-expired timer would leave an allow rule nothing can revoke. The
//! pass is idempotent: running it twice yields the same live rule set.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::alarms::AlarmScheduler;
use crate::error::Result;
use crate::rules::{block_rules_for, is_allow_rule_id, is_block_rule_id, Rule, RuleEngine};
use crate::storage::{StatePatch, StateStore, TemporaryAllows};

/// Which lifecycle event triggered the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePass {
    /// Fresh install of the extension/host.
    Install,
    /// Browser or process startup.
    Startup,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub pass: ReconcilePass,
    /// Rules removed from the allow-rule id range, recorded or orphaned.
    pub cleared_allow_rules: usize,
    /// Temporary-allow records dropped from the store.
    pub cleared_allow_records: usize,
    /// Block rules derived from the persisted session.
    pub block_rules: usize,
    /// Whether the block range was rewritten (false when already correct).
    pub reasserted: bool,
}

/// Re-derives live rule state from persisted intent.
pub struct ReconciliationController {
    store: Arc<dyn StateStore>,
    engine: Arc<dyn RuleEngine>,
    alarms: Arc<dyn AlarmScheduler>,
    interstitial_url: String,
}

impl ReconciliationController {
    pub fn new(
        store: Arc<dyn StateStore>,
        engine: Arc<dyn RuleEngine>,
        alarms: Arc<dyn AlarmScheduler>,
        interstitial_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            engine,
            alarms,
            interstitial_url: interstitial_url.into(),
        }
    }

    /// Fresh-install pass: clear timers, allow records, and the allow-rule
    /// range, then install block rules from the persisted session.
    pub fn on_install(&self) -> Result<ReconcileReport> {
        self.run(ReconcilePass::Install)
    }

    /// Startup pass: same allow-clearing sweep; block rules are rewritten
    /// only if the live range differs from the derived set.
    pub fn on_startup(&self) -> Result<ReconcileReport> {
        self.run(ReconcilePass::Startup)
    }

    fn run(&self, pass: ReconcilePass) -> Result<ReconcileReport> {
        // Timers first, so no expiry fires into the middle of the pass.
        self.alarms.clear_all();

        let state = self.store.read()?;
        let cleared_allow_records = state.temporary_allows.len();

        let live = self.engine.list_rules()?;
        let allow_ids: Vec<i32> = live
            .iter()
            .map(|r| r.id)
            .filter(|id| is_allow_rule_id(*id))
            .collect();
        let cleared_allow_rules = allow_ids.len();
        self.engine.update_rules(&allow_ids, vec![])?;
        if cleared_allow_records > 0 {
            self.store
                .merge(StatePatch::temporary_allows(TemporaryAllows::new()))?;
        }

        let derived = block_rules_for(&state.focus_session, &self.interstitial_url);
        let mut live_blocks: Vec<Rule> = live
            .into_iter()
            .filter(|r| is_block_rule_id(r.id))
            .collect();
        live_blocks.sort_by_key(|r| r.id);

        let reasserted = match pass {
            ReconcilePass::Install => true,
            ReconcilePass::Startup => live_blocks != derived,
        };
        if reasserted {
            let remove: Vec<i32> = live_blocks.iter().map(|r| r.id).collect();
            self.engine.update_rules(&remove, derived.clone())?;
        }

        let report = ReconcileReport {
            pass,
            cleared_allow_rules,
            cleared_allow_records,
            block_rules: derived.len(),
            reasserted,
        };
        info!(
            ?pass,
            cleared_allow_rules,
            cleared_allow_records,
            block_rules = report.block_rules,
            reasserted,
            "reconciliation pass complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::ManualAlarmScheduler;
    use crate::rules::{allow_rule, allow_rule_id, block_rule, MemoryRuleEngine, BLOCK_RULE_BASE};
    use crate::storage::{FocusSession, MemoryStore, PersistentState};

    const INTERSTITIAL: &str = "bounce://bouncer.html";

    struct Fixture {
        store: Arc<MemoryStore>,
        engine: Arc<MemoryRuleEngine>,
        alarms: Arc<ManualAlarmScheduler>,
        reconcile: ReconciliationController,
    }

    fn fixture(state: PersistentState) -> Fixture {
        let store = Arc::new(MemoryStore::with_state(state));
        let engine = Arc::new(MemoryRuleEngine::new());
        let alarms = Arc::new(ManualAlarmScheduler::new());
        let reconcile = ReconciliationController::new(
            Arc::clone(&store) as Arc<dyn StateStore>,
            Arc::clone(&engine) as Arc<dyn RuleEngine>,
            Arc::clone(&alarms) as Arc<dyn AlarmScheduler>,
            INTERSTITIAL,
        );
        Fixture {
            store,
            engine,
            alarms,
            reconcile,
        }
    }

    fn active_state(domains: &[&str]) -> PersistentState {
        PersistentState {
            focus_session: FocusSession {
                active: true,
                selected_tasks: Vec::new(),
                blacklist_domains: domains.iter().map(|d| d.to_string()).collect(),
                started_at: None,
            },
            ..PersistentState::default()
        }
    }

    #[test]
    fn install_reasserts_block_rules_from_persisted_session() {
        let f = fixture(active_state(&["youtube.com", "tiktok.com"]));
        let report = f.reconcile.on_install().unwrap();

        assert!(report.reasserted);
        assert_eq!(report.block_rules, 2);
        let ids: Vec<i32> = f.engine.list_rules().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![BLOCK_RULE_BASE, BLOCK_RULE_BASE + 1]);
    }

    #[test]
    fn install_clears_stale_allows_and_timers() {
        let mut state = active_state(&["youtube.com"]);
        state
            .temporary_allows
            .insert("tiktok.com".into(), 1_000);
        let f = fixture(state);
        f.alarms.create("temp-allow-tiktok.com", 1_000);
        f.engine
            .update_rules(
                &[],
                vec![allow_rule(allow_rule_id("tiktok.com"), "tiktok.com")],
            )
            .unwrap();

        let report = f.reconcile.on_install().unwrap();

        assert_eq!(report.cleared_allow_records, 1);
        assert_eq!(report.cleared_allow_rules, 1);
        assert!(f.alarms.is_empty());
        assert!(f.store.read().unwrap().temporary_allows.is_empty());
        let rules = f.engine.list_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, BLOCK_RULE_BASE);
    }

    #[test]
    fn orphaned_allow_rules_without_records_are_cleared() {
        // An unclean shutdown can leave a rule with no record behind it.
        let f = fixture(PersistentState::default());
        f.engine
            .update_rules(&[], vec![allow_rule(20_123, "ghost.com")])
            .unwrap();

        let report = f.reconcile.on_startup().unwrap();
        assert_eq!(report.cleared_allow_rules, 1);
        assert_eq!(report.cleared_allow_records, 0);
        assert!(f.engine.is_empty());
    }

    #[test]
    fn startup_skips_reassert_when_blocks_already_match() {
        let f = fixture(active_state(&["youtube.com"]));
        f.engine
            .update_rules(
                &[],
                vec![block_rule(BLOCK_RULE_BASE, "youtube.com", INTERSTITIAL)],
            )
            .unwrap();

        let report = f.reconcile.on_startup().unwrap();
        assert!(!report.reasserted);
        assert_eq!(f.engine.len(), 1);
    }

    #[test]
    fn startup_reasserts_when_blocks_diverged() {
        let f = fixture(active_state(&["youtube.com"]));
        // Live rules claim a different domain set than the persisted intent.
        f.engine
            .update_rules(
                &[],
                vec![
                    block_rule(BLOCK_RULE_BASE, "tiktok.com", INTERSTITIAL),
                    block_rule(BLOCK_RULE_BASE + 1, "x.com", INTERSTITIAL),
                ],
            )
            .unwrap();

        let report = f.reconcile.on_startup().unwrap();
        assert!(report.reasserted);

        let rules = f.engine.list_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0]
            .condition
            .regex_filter
            .as_deref()
            .unwrap()
            .contains(r"youtube\.com"));
    }

    #[test]
    fn inactive_session_reconciles_to_zero_rules() {
        let f = fixture(PersistentState::default());
        f.engine
            .update_rules(
                &[],
                vec![block_rule(BLOCK_RULE_BASE, "stale.com", INTERSTITIAL)],
            )
            .unwrap();

        let report = f.reconcile.on_install().unwrap();
        assert_eq!(report.block_rules, 0);
        assert!(f.engine.is_empty());
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let f = fixture(active_state(&["youtube.com", "tiktok.com"]));
        f.reconcile.on_install().unwrap();
        let after_first = f.engine.list_rules().unwrap();

        let report = f.reconcile.on_startup().unwrap();
        assert!(!report.reasserted);
        assert_eq!(f.engine.list_rules().unwrap(), after_first);

        f.reconcile.on_install().unwrap();
        assert_eq!(f.engine.list_rules().unwrap(), after_first);
    }
}
