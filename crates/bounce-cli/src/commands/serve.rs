//! NDJSON message loop: one request per stdin line, one response per
//! stdout line, with live expiry timers while the process runs.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use bounce_core::alarms::{AlarmScheduler, TokioAlarmScheduler};
use bounce_core::messages::{Message, Response, UNKNOWN_MESSAGE_ERROR};
use bounce_core::rules::{MemoryRuleEngine, RuleEngine};
use bounce_core::service::{run_service, service_channel};
use bounce_core::storage::{data_dir, Config, JsonFileStore, StateStore};
use bounce_core::BounceService;

use crate::common::{load_rules, save_rules};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve())
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = Arc::new(JsonFileStore::open()?);
    let rules_path = data_dir()?.join("rules.json");
    let engine = Arc::new(MemoryRuleEngine::with_rules(load_rules(&rules_path)?));

    let (alarms, fired_rx) = TokioAlarmScheduler::new();
    let service = BounceService::new(
        Arc::clone(&store) as Arc<dyn StateStore>,
        Arc::clone(&engine) as Arc<dyn RuleEngine>,
        Arc::new(alarms) as Arc<dyn AlarmScheduler>,
        &config,
    );

    // Process start is the startup lifecycle event.
    let report = service.on_startup()?;
    save_rules(&rules_path, engine.as_ref())?;
    info!(block_rules = report.block_rules, "serving message protocol");

    let (handle, command_rx) = service_channel();
    let loop_task = tokio::spawn(run_service(service, command_rx, fired_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => match Message::parse(&value) {
                Ok(message) => handle.send(message).await,
                Err(error) => Response::err(error),
            },
            Err(_) => Response::err(UNKNOWN_MESSAGE_ERROR),
        };
        println!("{}", serde_json::to_string(&response)?);
        save_rules(&rules_path, engine.as_ref())?;
    }

    // Stdin closed: drop the handle so the service loop drains and exits.
    drop(handle);
    let _ = loop_task.await;
    save_rules(&rules_path, engine.as_ref())?;
    Ok(())
}
