use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "approval-sync", about = "Approval callback ingestion service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server (default when no subcommand is given).
    Serve {
        /// Port to listen on; falls back to the PORT env var, then 8000.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Fetch and persist one approval instance by code. Use this to backfill
    /// instances whose callbacks were missed or to re-pull for reconciliation.
    Backfill {
        /// The vendor's instance_code.
        instance_code: String,
    },
}
