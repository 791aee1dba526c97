//! Command-line arguments.

pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use versiondb::db::DEFAULT_DATABASE_PATH;
use versiondb::model::StorageKind;

#[derive(Parser)]
#[command(
    name = "versiondb",
    about = "Versioned collections of logical files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the metadata database
    #[arg(long, global = true, default_value = DEFAULT_DATABASE_PATH)]
    pub database: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List all collections
    List,
    /// Create a new collection
    Create(CreateArgs),
    /// Show collection details
    Show(ShowArgs),
    /// List files in a collection
    Files(FilesArgs),
    /// Add a file to a collection
    AddFile(AddFileArgs),
    /// Record a new version of a file
    AddVersion(AddVersionArgs),
    /// List versions of a file
    Versions(VersionsArgs),
    /// Show the derivation chain of a version
    Lineage(LineageArgs),
    /// Resolve a versiondb:// address
    Resolve(ResolveArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    pub name: String,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(short, long)]
    pub project: Option<String>,
    #[arg(short, long)]
    pub owner: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub name: String,
}

#[derive(Args)]
pub struct FilesArgs {
    pub collection: String,
}

#[derive(Args)]
pub struct AddFileArgs {
    pub collection: String,
    pub name: String,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(short, long)]
    pub owner: Option<String>,
}

#[derive(Args)]
pub struct AddVersionArgs {
    pub collection: String,
    pub file: String,
    /// Local data to push
    #[arg(long, conflicts_with = "hash", required_unless_present = "hash")]
    pub path: Option<PathBuf>,
    /// Precomputed content hash; nothing is pushed
    #[arg(long)]
    pub hash: Option<String>,
    #[arg(long, default_value = "md5")]
    pub algorithm: String,
    #[arg(long, value_parser = parse_kind, default_value = "LOCAL")]
    pub kind: StorageKind,
    #[arg(long, default_value = "")]
    pub address: String,
    /// Id of the version this one was derived from
    #[arg(long)]
    pub from: Option<String>,
    #[arg(long, default_value = "")]
    pub transformer: String,
}

#[derive(Args)]
pub struct VersionsArgs {
    pub collection: String,
    pub file: String,
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct LineageArgs {
    pub version_id: String,
    #[arg(long)]
    pub depth: Option<usize>,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub uri: String,
    /// Hash recorded on the last run, to report change status
    #[arg(long)]
    pub recorded: Option<String>,
}

fn parse_kind(s: &str) -> Result<StorageKind, String> {
    s.to_ascii_uppercase().parse().map_err(|e| format!("{e}"))
}
