pub mod ingest;
pub mod init;
pub mod status;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fblr", about = "Receivables ledger extract ingestion.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up fblr: choose a data directory and initialize the database.
    Init {
        /// Root for the database, terminal file areas and archive
        /// (default: ~/Documents/fblr)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Ingest one or more extract files, each fully processed in turn.
    Ingest {
        /// Paths to extract files (e.g. CISP_ABERTO_16_12_2020_.txt)
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Show durable store counts.
    Status,
}
