use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Download a range of novel chapters into one offline HTML file")]
pub struct Cli {
    /// Directory holding settings.json.
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Also print diagnostic logging to the terminal.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch chapters and assemble them into a single HTML document.
    Download(DownloadArgs),
    /// List the chapters found on a listing page.
    Scan(ScanArgs),
    /// Show or change persisted settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Novel page whose chapter list is scanned.
    #[arg(long, conflicts_with_all = ["list_file", "chapter_url"])]
    pub list_url: Option<String>,

    /// Saved listing page to scan instead of fetching one.
    #[arg(long, conflicts_with = "chapter_url")]
    pub list_file: Option<PathBuf>,

    /// Base for relative links in --list-file.
    #[arg(long, requires = "list_file")]
    pub base_url: Option<String>,

    /// Chapter page to download; repeat for several, in order.
    #[arg(long = "chapter-url")]
    pub chapter_url: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct TransportArgs {
    /// Cookie header for the primary requests, e.g. a clearance cookie.
    #[arg(long)]
    pub cookie: Option<String>,

    /// Referer header for the primary requests.
    #[arg(long)]
    pub referer: Option<String>,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub transport: TransportArgs,

    /// First chapter to download (1-based).
    #[arg(long)]
    pub from: Option<usize>,

    /// Last chapter to download (inclusive).
    #[arg(long)]
    pub to: Option<usize>,

    /// Output directory for the HTML document.
    #[arg(long, default_value = "output")]
    pub out: PathBuf,

    /// Write the run log into this directory when done.
    #[arg(long)]
    pub export_logs: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub transport: TransportArgs,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    /// Set one key, e.g. `batchSize 8` or `compact-ui on`.
    Set { key: String, value: String },
    Reset,
}
