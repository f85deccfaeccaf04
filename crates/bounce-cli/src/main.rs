use clap::{Parser, Subcommand};

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "bounce-cli", version, about = "Bounce CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Focus session control
    Focus {
        #[command(subcommand)]
        action: commands::focus::FocusAction,
    },
    /// Temporary access control
    Allow {
        #[command(subcommand)]
        action: commands::allow::AllowAction,
    },
    /// Rule-state reconciliation
    Reconcile {
        #[command(subcommand)]
        action: commands::reconcile::ReconcileAction,
    },
    /// Ask the decision service for access to a blocked domain
    Ask {
        /// Domain to unlock
        domain: String,
        /// Why access is needed
        message: String,
        /// Minutes of access if granted
        #[arg(long)]
        minutes: Option<u64>,
    },
    /// Serve the message protocol as NDJSON over stdin/stdout
    Serve,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Focus { action } => commands::focus::run(action),
        Commands::Allow { action } => commands::allow::run(action),
        Commands::Reconcile { action } => commands::reconcile::run(action),
        Commands::Ask {
            domain,
            message,
            minutes,
        } => commands::ask::run(domain, message, minutes),
        Commands::Serve => commands::serve::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
