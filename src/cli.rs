//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use harvester_core::{AccessFilter, SearchType, SortOrder};

/// Search scholarly metadata and harvest open full-text PDFs.
///
/// `search` queries the OpenAlex works endpoint and can download the PDFs
/// behind the returned DOIs; `fetch` downloads PDFs for DOIs you supply.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/harvester/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for per-DOI diagnostics (landing/view HTML, resolution logs)
    #[arg(long, global = true, value_name = "DIR")]
    pub debug_dir: Option<PathBuf>,

    /// Do not write diagnostics
    #[arg(long, global = true)]
    pub no_debug: bool,

    /// Per-request timeout in seconds (1-3600)
    #[arg(long, global = true, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the metadata API, optionally downloading the results' PDFs
    Search(SearchArgs),
    /// Download PDFs for DOIs given as arguments or on stdin
    Fetch(FetchArgs),
}

#[derive(ClapArgs, Debug)]
pub struct SearchArgs {
    /// Query text; commas join terms with OR, AND/OR/NOT and quotes pass through
    pub query: String,

    /// Maximum rows to return (1-10000)
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..=10_000))]
    pub max_results: Option<u64>,

    /// Which fields the query is matched against
    #[arg(long, value_enum, default_value_t = SearchTypeArg::General)]
    pub search_type: SearchTypeArg,

    /// Open-access filter
    #[arg(long, value_enum, default_value_t = AccessArg::All)]
    pub access: AccessArg,

    /// Earliest publication year (0-9999)
    #[arg(long, value_parser = clap::value_parser!(i32).range(0..=9999))]
    pub year_from: Option<i32>,

    /// Latest publication year (0-9999)
    #[arg(long, value_parser = clap::value_parser!(i32).range(0..=9999))]
    pub year_to: Option<i32>,

    /// Result ordering
    #[arg(long, value_enum, default_value_t = SortArg::Relevance)]
    pub sort: SortArg,

    /// Write result rows as JSON to FILE instead of printing a table
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Download PDFs for the returned DOIs into DIR
    #[arg(short, long, value_name = "DIR")]
    pub download: Option<PathBuf>,

    /// Zip the downloaded PDFs into FILE (requires --download)
    #[arg(long, value_name = "FILE", requires = "download")]
    pub archive: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct FetchArgs {
    /// DOIs to fetch; read from stdin when omitted
    pub dois: Vec<String>,

    /// Directory receiving the PDFs (defaults to `output_dir` from config)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Zip the downloaded PDFs into FILE
    #[arg(long, value_name = "FILE")]
    pub archive: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTypeArg {
    General,
    TitleAbstract,
    TitleOnly,
}

impl From<SearchTypeArg> for SearchType {
    fn from(value: SearchTypeArg) -> Self {
        match value {
            SearchTypeArg::General => Self::General,
            SearchTypeArg::TitleAbstract => Self::TitleAbstract,
            SearchTypeArg::TitleOnly => Self::TitleOnly,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessArg {
    All,
    OpenAccessOnly,
    ClosedOnly,
}

impl From<AccessArg> for AccessFilter {
    fn from(value: AccessArg) -> Self {
        match value {
            AccessArg::All => Self::All,
            AccessArg::OpenAccessOnly => Self::OpenAccessOnly,
            AccessArg::ClosedOnly => Self::ClosedOnly,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortArg {
    Relevance,
    Citations,
    Recent,
}

impl From<SortArg> for SortOrder {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Relevance => Self::Relevance,
            SortArg::Citations => Self::Citations,
            SortArg::Recent => Self::Recent,
        }
    }
}
