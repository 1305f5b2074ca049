//! Run a suite of test programs declared in a TOML file.
//!
//! Every test runs in its own process with stdout and stderr captured to
//! `test_logs/<run>/<path>.txt`, while the terminal shows a live tree of
//! results.

use std::path::PathBuf;

use clap::Parser;
use suite_runner::cli::{RunArgs, execute};
use suite_runner::exit_codes;
use suite_runner::io::suite_file::SuiteFile;
use suite_runner::logging;

#[derive(Parser)]
#[command(
    name = "suite-runner",
    version,
    about = "Run a tree of tests in parallel, one process per test"
)]
struct Cli {
    /// Suite definition (TOML).
    #[arg(long, short)]
    suite: PathBuf,

    #[command(flatten)]
    run: RunArgs,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    std::process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let file = match SuiteFile::load(&cli.suite) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("{err:#}");
            return exit_codes::INVALID;
        }
    };
    let options = cli.run.apply(file.options);
    execute(&file.root, &options, cli.run.report.as_deref())
}
