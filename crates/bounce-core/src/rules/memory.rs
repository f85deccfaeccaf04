//! In-memory rule engine.
//!
//! Reference implementation of [`RuleEngine`] backed by an id-ordered map.
//! Used directly by tests and by hosts that snapshot the rule set to disk
//! themselves (the CLI persists it between invocations to stand in for the
//! browser's dynamic-rule store).

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::{Rule, RuleEngine};
use crate::error::RuleEngineError;

/// Id-ordered in-memory rule store.
#[derive(Debug, Default)]
pub struct MemoryRuleEngine {
    rules: Mutex<BTreeMap<i32, Rule>>,
}

impl MemoryRuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the engine with an existing rule set.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        let map = rules.into_iter().map(|r| (r.id, r)).collect();
        Self {
            rules: Mutex::new(map),
        }
    }

    /// Number of live rules.
    pub fn len(&self) -> usize {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RuleEngine for MemoryRuleEngine {
    fn list_rules(&self) -> Result<Vec<Rule>, RuleEngineError> {
        let rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rules.values().cloned().collect())
    }

    fn update_rules(&self, remove_ids: &[i32], add_rules: Vec<Rule>) -> Result<(), RuleEngineError> {
        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        for id in remove_ids {
            // Removing an absent id is a no-op, like the engine this models.
            rules.remove(id);
        }
        for rule in add_rules {
            rules.insert(rule.id, rule);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{allow_rule, block_rule};

    #[test]
    fn update_removes_before_adding() {
        let engine = MemoryRuleEngine::new();
        let old = block_rule(10_000, "youtube.com", "bounce://bouncer.html");
        engine.update_rules(&[], vec![old]).unwrap();

        // Same id in both halves of the batch: the add wins.
        let new = block_rule(10_000, "tiktok.com", "bounce://bouncer.html");
        engine.update_rules(&[10_000], vec![new.clone()]).unwrap();

        let rules = engine.list_rules().unwrap();
        assert_eq!(rules, vec![new]);
    }

    #[test]
    fn removing_absent_ids_is_a_noop() {
        let engine = MemoryRuleEngine::new();
        engine.update_rules(&[10_000, 20_001], vec![]).unwrap();
        assert!(engine.is_empty());
    }

    #[test]
    fn list_is_ordered_by_id() {
        let engine = MemoryRuleEngine::new();
        engine
            .update_rules(
                &[],
                vec![
                    allow_rule(20_005, "b.com"),
                    block_rule(10_001, "a.com", "bounce://bouncer.html"),
                    block_rule(10_000, "c.com", "bounce://bouncer.html"),
                ],
            )
            .unwrap();
        let ids: Vec<i32> = engine.list_rules().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10_000, 10_001, 20_005]);
    }

    #[test]
    fn with_rules_seeds_the_store() {
        let seeded = MemoryRuleEngine::with_rules(vec![allow_rule(20_001, "x.com")]);
        assert_eq!(seeded.len(), 1);
    }
}
