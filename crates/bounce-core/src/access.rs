//! Time-boxed per-domain overrides.
//!
//! A temporary allow supersedes blocking for one exact domain until its
//! expiry timestamp. Every recorded allow has a named alarm scheduled for its
//! expiry; revocation is idempotent, so an alarm re-firing for an
//! already-revoked domain is a no-op rather than an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::alarms::AlarmScheduler;
use crate::domain::normalize_domain;
use crate::error::{CoreError, Result};
use crate::rules::{allow_rule, allow_rule_id, RuleEngine};
use crate::storage::{StatePatch, StateStore, TemporaryAllows};

/// Reserved name prefix for expiry alarms; the rest of the name is the
/// normalized domain.
pub const TEMP_ALLOW_ALARM_PREFIX: &str = "temp-allow-";

/// Alarm name for a normalized domain's expiry.
pub fn temp_allow_alarm_name(domain: &str) -> String {
    format!("{TEMP_ALLOW_ALARM_PREFIX}{domain}")
}

/// Grants, tracks, and expires temporary allows.
pub struct TemporaryAccessManager {
    store: Arc<dyn StateStore>,
    engine: Arc<dyn RuleEngine>,
    alarms: Arc<dyn AlarmScheduler>,
    default_minutes: u64,
}

impl TemporaryAccessManager {
    pub fn new(
        store: Arc<dyn StateStore>,
        engine: Arc<dyn RuleEngine>,
        alarms: Arc<dyn AlarmScheduler>,
        default_minutes: u64,
    ) -> Self {
        Self {
            store,
            engine,
            alarms,
            default_minutes,
        }
    }

    /// Grant time-boxed access: upsert the allow rule at the domain's hashed
    /// slot, record the expiry, and schedule revocation.
    ///
    /// Returns the absolute expiry in epoch millis.
    pub fn grant(&self, domain: &str, minutes: Option<u64>) -> Result<i64> {
        let clean = normalize_domain(domain);
        if clean.is_empty() {
            return Err(CoreError::Custom(
                "Cannot grant access to an empty domain".into(),
            ));
        }
        let minutes = minutes.unwrap_or(self.default_minutes);
        let rule_id = allow_rule_id(&clean);

        // Remove-then-add in one batch: a colliding slot is overwritten, not
        // duplicated.
        self.engine
            .update_rules(&[rule_id], vec![allow_rule(rule_id, &clean)])?;

        let expires_at = Utc::now().timestamp_millis() + minutes as i64 * 60_000;
        let mut allows = self.store.read()?.temporary_allows;
        allows.insert(clean.clone(), expires_at);
        self.store.merge(StatePatch::temporary_allows(allows))?;

        self.alarms.create(&temp_allow_alarm_name(&clean), expires_at);

        info!(domain = %clean, minutes, rule_id, "temporary access granted");
        Ok(expires_at)
    }

    /// Revoke the allow for a domain: rule, record, and pending alarm.
    ///
    /// Revoking an absent domain is a no-op, not an error.
    pub fn revoke(&self, domain: &str) -> Result<()> {
        let clean = normalize_domain(domain);
        let rule_id = allow_rule_id(&clean);

        self.engine.update_rules(&[rule_id], vec![])?;

        let mut allows = self.store.read()?.temporary_allows;
        let was_present = allows.remove(&clean).is_some();
        self.store.merge(StatePatch::temporary_allows(allows))?;

        self.alarms.clear(&temp_allow_alarm_name(&clean));

        debug!(domain = %clean, was_present, "temporary access revoked");
        Ok(())
    }

    /// Drop every outstanding allow: rules in one batch, records, alarms.
    ///
    /// Returns how many records were cleared. Only recorded domains are
    /// touched; orphaned rules in the allow range are reconciliation's job.
    pub fn clear_all(&self) -> Result<usize> {
        let allows = self.store.read()?.temporary_allows;
        if allows.is_empty() {
            return Ok(0);
        }

        // Colliding domains share a slot; dedupe ids before the batch.
        let ids: Vec<i32> = allows
            .keys()
            .map(|d| allow_rule_id(d))
            .collect::<BTreeSet<i32>>()
            .into_iter()
            .collect();
        self.engine.update_rules(&ids, vec![])?;
        self.store
            .merge(StatePatch::temporary_allows(TemporaryAllows::new()))?;
        for domain in allows.keys() {
            self.alarms.clear(&temp_allow_alarm_name(domain));
        }

        info!(cleared = allows.len(), "all temporary allows cleared");
        Ok(allows.len())
    }

    /// React to a fired alarm. Returns whether the alarm belonged to this
    /// manager; unrelated names are ignored.
    pub fn handle_alarm(&self, name: &str) -> Result<bool> {
        match name.strip_prefix(TEMP_ALLOW_ALARM_PREFIX) {
            Some(domain) => {
                debug!(domain, "expiry alarm fired");
                self.revoke(domain)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Revoke every allow whose expiry is at or before `now_ms`.
    ///
    /// Hosts whose alarms do not outlive the process (one-shot CLI runs)
    /// call this instead of waiting for timers. Returns the revoked domains.
    pub fn sweep_expired(&self, now_ms: i64) -> Result<Vec<String>> {
        let allows = self.store.read()?.temporary_allows;
        let overdue: Vec<String> = allows
            .iter()
            .filter(|(_, &expires_at)| expires_at <= now_ms)
            .map(|(domain, _)| domain.clone())
            .collect();
        for domain in &overdue {
            self.revoke(domain)?;
        }
        Ok(overdue)
    }

    /// Whether the sanitizer should run on `domain`: an active session plus
    /// an unexpired temporary allow for it.
    pub fn sanitize_enabled(&self, domain: &str, now_ms: i64) -> Result<bool> {
        let state = self.store.read()?;
        let clean = normalize_domain(domain);
        Ok(state.focus_session.active
            && state
                .temporary_allows
                .get(&clean)
                .is_some_and(|&expires_at| expires_at > now_ms))
    }
}
