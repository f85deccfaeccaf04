use clap::Subcommand;

use bounce_core::StateStore;

use crate::common::CliContext;

#[derive(Subcommand)]
pub enum FocusAction {
    /// Start a focus session blocking the given domains
    Start {
        /// Domains to block; defaults to the stored blacklist
        domains: Vec<String>,
    },
    /// Stop the focus session
    Stop,
    /// Print the focus session as JSON
    Status,
}

pub fn run(action: FocusAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = CliContext::open()?;

    match action {
        FocusAction::Start { domains } => {
            let domains = if domains.is_empty() {
                ctx.store.read()?.blacklist_domains
            } else {
                domains
            };
            let session = ctx.service.start_focus(Vec::new(), domains)?;
            ctx.save()?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        FocusAction::Stop => {
            let session = ctx.service.stop_focus()?;
            ctx.save()?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        FocusAction::Status => {
            let session = ctx.service.focus_state()?;
            ctx.save()?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
    }

    Ok(())
}
