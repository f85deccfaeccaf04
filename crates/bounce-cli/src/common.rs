//! Shared CLI plumbing.
//!
//! One-shot invocations have no live timers and no browser rule store. The
//! rule snapshot file stands in for the latter, loaded into the in-memory
//! engine on open and written back after the command runs; overdue allows
//! are swept on open instead of waiting for alarms that will never fire.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bounce_core::alarms::{AlarmScheduler, ManualAlarmScheduler};
use bounce_core::rules::{MemoryRuleEngine, Rule, RuleEngine};
use bounce_core::storage::{data_dir, Config, JsonFileStore, StateStore};
use bounce_core::BounceService;

pub struct CliContext {
    pub config: Config,
    pub store: Arc<JsonFileStore>,
    pub service: BounceService,
    engine: Arc<MemoryRuleEngine>,
    rules_path: PathBuf,
}

impl CliContext {
    /// Build a service over the on-disk state and rule snapshot.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let store = Arc::new(JsonFileStore::open()?);
        let rules_path = data_dir()?.join("rules.json");
        let engine = Arc::new(MemoryRuleEngine::with_rules(load_rules(&rules_path)?));
        let service = BounceService::new(
            Arc::clone(&store) as Arc<dyn StateStore>,
            Arc::clone(&engine) as Arc<dyn RuleEngine>,
            Arc::new(ManualAlarmScheduler::new()) as Arc<dyn AlarmScheduler>,
            &config,
        );

        let ctx = Self {
            config,
            store,
            service,
            engine,
            rules_path,
        };
        ctx.service.sweep_expired()?;
        Ok(ctx)
    }

    /// Persist the rule snapshot; call after any mutating command.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        save_rules(&self.rules_path, self.engine.as_ref())?;
        Ok(())
    }
}

/// Load the rule snapshot, or nothing on first run.
pub fn load_rules(path: &Path) -> Result<Vec<Rule>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write the live rule set back to the snapshot file.
pub fn save_rules(path: &Path, engine: &dyn RuleEngine) -> Result<(), Box<dyn std::error::Error>> {
    let rules = engine.list_rules()?;
    let content = serde_json::to_string_pretty(&rules)?;
    std::fs::write(path, content)?;
    Ok(())
}
