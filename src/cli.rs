use std::path::PathBuf;

use clap::Parser;

/// Query PubMed for an author's publications and keep a site data file of
/// citations up to date, fetching each paper at most once across runs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Contact email sent to NCBI with every E-utilities request
    pub email: String,

    /// Author to search for, in the form "LastName INITIALS"
    pub author: String,

    /// Maximum number of articles to retrieve; unset, incremental runs use
    /// 20 and first runs 100
    #[arg(long)]
    pub max: Option<usize>,

    /// Also print full article information, including abstracts (read-only)
    #[arg(short, long)]
    pub verbose: bool,

    /// Search and diff only; do not fetch, parse, or write anything
    #[arg(short = 'd', long)]
    pub no_write: bool,

    /// Directory holding the identifier and citation files
    #[arg(long, default_value = "_data")]
    pub data_dir: PathBuf,
}
