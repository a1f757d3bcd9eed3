use clap::Parser;

use crate::cli::Cli;
use crate::run::RunOptions;
use crate::source::entrez::EntrezClient;
use crate::store::DataPaths;

mod cli;
mod citation;
mod error;
mod record;
mod run;
mod source;
mod store;

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let paths = DataPaths::new(&args.data_dir);
    let opts = RunOptions {
        // PubMed field-tags the term so the search stays on author names.
        query: format!("{}[Author]", args.author),
        max: args.max,
        verbose: args.verbose,
        no_write: args.no_write,
    };
    let client = EntrezClient::new(args.email);
    run::run(&client, &paths, &opts)
}
