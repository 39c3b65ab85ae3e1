use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "cstore",
    about = "Inspect and edit a cstore content cache",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Use the smaller write buffer for constrained hardware
    #[arg(long, global = true)]
    pub low_resource: bool,

    /// Print store metrics after the command
    #[arg(long, global = true)]
    pub stats: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store content under a key
    Put(PutArgs),
    /// Print the content stored under one or more keys
    Get(GetArgs),
    /// Print every entry whose key starts with a prefix
    Scan(ScanArgs),
    /// List every stored key
    Keys,
    /// Delete one or more keys
    Delete(DeleteArgs),
    /// Delete every key starting with a prefix
    DeletePrefix(DeletePrefixArgs),
    /// Delete every key
    Clear,
    /// Commit a mutation read from a JSON file
    Apply(ApplyArgs),
    /// Rewrite the log so it holds only live entries
    Compact,
}

#[derive(Args, Debug)]
pub struct PutArgs {
    pub key: String,
    /// Content as text
    #[arg(conflicts_with = "file", required_unless_present = "file")]
    pub value: Option<String>,
    /// Read the content from a file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[arg(default_value = "")]
    pub prefix: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DeletePrefixArgs {
    pub prefix: String,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    pub path: PathBuf,
}
