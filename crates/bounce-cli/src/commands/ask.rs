use chrono::DateTime;

use bounce_core::decision::{DecisionClient, DecisionRequest};
use bounce_core::domain::normalize_domain;
use bounce_core::storage::StatePatch;
use bounce_core::StateStore;

use crate::common::CliContext;

/// Decision-service round trip: plead the case, grant on approval.
pub fn run(
    domain: String,
    message: String,
    minutes: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = CliContext::open()?;
    let session = ctx.service.focus_state()?;

    let request = DecisionRequest {
        target_domain: normalize_domain(&domain),
        user_message: message,
        task: session.selected_tasks.first().cloned(),
        tasks: session.selected_tasks.clone(),
    };

    let client = DecisionClient::new(&ctx.config.decision_endpoint)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let verdict = runtime.block_on(client.decide(&request))?;

    ctx.store.merge(StatePatch::decision(verdict.clone()))?;

    if verdict.grant_access {
        let expires_at = ctx.service.request_temp_access(&domain, minutes)?;
        let until = DateTime::from_timestamp_millis(expires_at)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| expires_at.to_string());
        println!("Granted until {until}");
        if let Some(reason) = verdict.reason {
            println!("Reason: {reason}");
        }
    } else {
        println!(
            "{}",
            verdict
                .response
                .unwrap_or_else(|| "Denied. Back to work.".to_string())
        );
    }
    ctx.save()?;

    Ok(())
}
