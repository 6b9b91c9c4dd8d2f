mod args;
mod corr;

use clap::Parser;
use log::{info, LevelFilter};
use snafu::ErrorCompat;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match corr::run_from_args(&args) {
        Ok(outcome) => {
            info!(
                "Done: {} districts, {} correlations ({} significant), {} files written",
                outcome.joined_districts,
                outcome.ranked.all.len(),
                outcome.ranked.significant.len(),
                outcome.written.len()
            );
        }
        Err(e) => {
            eprintln!("An error occurred: {}", e);
            for cause in e.iter_chain().skip(1) {
                eprintln!("  caused by: {}", cause);
            }
            std::process::exit(1);
        }
    }
}
