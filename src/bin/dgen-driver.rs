//! Driver frontend binary.

use clap::Parser;
use dgen_driver::cli::{self, Cli};
use dgen_driver::logging::init_logging;
use std::process;
use tracing::error;

fn main() {
    let cli = Cli::parse();

    let logging_config = cli.logging_config();
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    if let Err(e) = cli::run(&cli) {
        error!("driver failed: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
