use clap::Subcommand;

use crate::common::CliContext;

#[derive(Subcommand)]
pub enum ReconcileAction {
    /// Run the fresh-install pass
    Install,
    /// Run the startup pass
    Startup,
}

pub fn run(action: ReconcileAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = CliContext::open()?;

    let report = match action {
        ReconcileAction::Install => ctx.service.on_install()?,
        ReconcileAction::Startup => ctx.service.on_startup()?,
    };
    ctx.save()?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
