//! # payhold CLI Entry Point
//!
//! Assembles subcommands and dispatches to the demo handlers.

use clap::Parser;

mod demo;

/// Payhold — escrow engine and wallet ledger toolchain.
///
/// Seeds an in-memory deployment and walks real lifecycles through the
/// engine: the happy path, a dispute with admin resolution, and a
/// deadline sweep pass.
#[derive(Parser, Debug)]
#[command(name = "payhold", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Create → accept → fund → deliver → confirm, end to end.
    Lifecycle(demo::LifecycleArgs),
    /// Fund, dispute, and resolve through the admin path.
    Dispute(demo::DisputeArgs),
    /// Run one deadline sweep pass over a seeded mix of escrows.
    Sweep(demo::SweepArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Lifecycle(args) => demo::lifecycle(args),
        Commands::Dispute(args) => demo::dispute(args),
        Commands::Sweep(args) => demo::sweep(args),
    }
}
