use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::Identifier;

#[derive(Debug, Parser)]
#[command(
    name = "transmigrate",
    about = "Move torrent metadata (.torrent and .resume files) from one torrent daemon to another.",
    long_about = "Transmigrate lists the torrents on a source daemon, keeps those matching every -c/--conditions pair (and --age, if given), copies their .torrent and .resume files to the destination host, registers them with the destination daemon, and optionally removes them from the source.\n\nEndpoints are written [USER@]HOST:PORT:TORRENT_DIR:RESUME_DIR. Data files are never moved.",
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    #[arg(
        short = 's',
        long = "source",
        global = true,
        value_name = "ENDPOINT",
        help = "Source daemon as [USER@]HOST:PORT:TORRENT_DIR:RESUME_DIR."
    )]
    pub(crate) source: Option<String>,

    #[arg(
        short = 'd',
        long = "destination",
        global = true,
        value_name = "ENDPOINT",
        help = "Destination daemon as [USER@]HOST:PORT:TORRENT_DIR:RESUME_DIR."
    )]
    pub(crate) destination: Option<String>,

    /// Only migrate torrents whose FIELD line contains SUBSTRING (repeatable; also supports comma-separated lists).
    #[arg(
        short = 'c',
        long = "conditions",
        action = clap::ArgAction::Append,
        value_name = "FIELD=SUBSTRING",
        help = "Only migrate torrents whose FIELD line contains SUBSTRING (repeatable; also supports comma-separated lists)."
    )]
    pub(crate) conditions: Vec<String>,

    #[arg(
        long = "age",
        value_name = "SECONDS",
        help = "Only migrate torrents finished at least this long ago (suffixes s, m, h, d, w accepted)."
    )]
    pub(crate) age: Option<String>,

    #[arg(
        short = 'l',
        long = "limit",
        value_name = "N",
        help = "Stop after N successful migrations."
    )]
    pub(crate) limit: Option<u64>,

    #[arg(
        short = 'r',
        long = "remove-from-source",
        help = "Remove each migrated torrent from the source daemon (data files are kept)."
    )]
    pub(crate) remove_from_source: bool,

    #[arg(
        short = 'i',
        long = "identifier",
        value_enum,
        default_value_t = Identifier::Hash,
        help = "How metadata files are named on disk."
    )]
    pub(crate) identifier: Identifier,

    #[arg(long = "dry-run", help = "Print intended actions without copying, adding or removing anything.")]
    pub(crate) dry_run: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        help = "Report skipped torrents and echo every step to stderr."
    )]
    pub(crate) verbose: bool,

    #[arg(
        long = "config",
        global = true,
        value_name = "PATH",
        help = "Load settings from PATH instead of ~/.config/transmigrate.yml."
    )]
    pub(crate) config: Option<PathBuf>,

    #[arg(
        long = "report",
        value_name = "PATH",
        help = "Write a JSON report of every torrent's outcome to PATH."
    )]
    pub(crate) report: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CliCommand {
    #[command(about = "Check the configured tools and that both control endpoints answer.")]
    /// Check the configured tools and that both control endpoints answer.
    Doctor,
}
