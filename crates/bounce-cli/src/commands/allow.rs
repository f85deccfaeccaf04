use chrono::DateTime;
use clap::Subcommand;

use bounce_core::StateStore;

use crate::common::CliContext;

#[derive(Subcommand)]
pub enum AllowAction {
    /// Grant time-boxed access to a domain
    Grant {
        /// Domain to allow
        domain: String,
        /// Minutes of access
        #[arg(long)]
        minutes: Option<u64>,
    },
    /// Revoke a temporary allow
    Revoke {
        /// Domain to revoke
        domain: String,
    },
    /// List outstanding temporary allows as JSON
    List,
}

pub fn run(action: AllowAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = CliContext::open()?;

    match action {
        AllowAction::Grant { domain, minutes } => {
            let expires_at = ctx.service.request_temp_access(&domain, minutes)?;
            ctx.save()?;
            let until = DateTime::from_timestamp_millis(expires_at)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| expires_at.to_string());
            println!("Access granted until {until}");
        }
        AllowAction::Revoke { domain } => {
            ctx.service.revoke_temp_access(&domain)?;
            ctx.save()?;
            println!("Access revoked");
        }
        AllowAction::List => {
            let allows = ctx.store.read()?.temporary_allows;
            ctx.save()?;
            println!("{}", serde_json::to_string_pretty(&allows)?);
        }
    }

    Ok(())
}
