use clap::{Args, Parser, Subcommand};

use crate::scan::DEFAULT_MAX_FILES;

#[derive(Debug, Parser)]
#[command(name = "shelfscan", author, version, about)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Scan(ScanArgs),
    Extract(ExtractArgs),
    Toc(TocArgs),
    Archive(ArchiveArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to search recursively for .epub files.
    #[arg(long)]
    pub dir: String,

    /// Stop after this many files.
    #[arg(long, default_value_t = DEFAULT_MAX_FILES)]
    pub max_files: usize,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Container files to extract, in order.
    pub paths: Vec<String>,

    /// Also extract every .epub found under this directory.
    #[arg(long)]
    pub dir: Option<String>,

    /// Cap on files taken from --dir.
    #[arg(long, default_value_t = DEFAULT_MAX_FILES)]
    pub max_files: usize,

    /// Write the CSV report here.
    #[arg(long)]
    pub csv: Option<String>,

    /// Write all results (including failures) as JSON here.
    #[arg(long)]
    pub json: Option<String>,

    /// Write a zip bundle (report, results, covers) here.
    #[arg(long)]
    pub archive: Option<String>,

    /// Skip cover lookup.
    #[arg(long)]
    pub no_cover: bool,

    /// Seed for placeholder data, for reproducible output.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Overwrite existing output files.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct TocArgs {
    /// Container file to open.
    pub path: String,
}

#[derive(Debug, Args)]
pub struct ArchiveArgs {
    /// Output zip path.
    #[arg(long)]
    pub out: String,

    /// Overwrite the output if it exists.
    #[arg(long)]
    pub force: bool,

    /// Files to pack; each is stored under its file name.
    #[arg(required = true)]
    pub files: Vec<String>,
}
