use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::SourceConfig;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Look up stores across point-of-sale spreadsheets",
    long_about = None
)]
pub struct Cli {
    /// YAML file describing the sources to join
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Source as `kind=location[#sheet]`; kinds: points_of_sale, sales, promotions, gift_vouchers
    #[arg(short, long = "source", global = true, action = clap::ArgAction::Append)]
    pub sources: Vec<SourceConfig>,
    /// Extra store-number column name, tried before the built-in aliases
    #[arg(long = "key-alias", global = true, action = clap::ArgAction::Append)]
    pub key_aliases: Vec<String>,
    /// Seconds a loaded source stays fresh
    #[arg(long, global = true)]
    pub ttl: Option<u64>,
    /// Seconds to wait for a remote source before giving up on it
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
    /// Character encoding of local CSV files (defaults to utf-8)
    #[arg(long = "input-encoding", global = true)]
    pub input_encoding: Option<String>,
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show every field of one store, matched on its store number
    Lookup(LookupArgs),
    /// List stores with any field containing the given text
    Search(SearchArgs),
    /// Count stores, stores with promotions and stores without sales
    Summary,
    /// Print the whole reconciled table
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Store number (case and surrounding spaces are ignored)
    pub store: String,
    /// Match on this column instead of the store number
    #[arg(long)]
    pub column: Option<String>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Text to look for; an empty string lists every store
    #[arg(default_value = "")]
    pub query: String,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Print at most this many rows
    #[arg(long)]
    pub limit: Option<usize>,
}
