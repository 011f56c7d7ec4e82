//! pgbridge entry point
//!
//! Parses arguments, dispatches to the CLI, prints any fatal error to
//! stderr and exits non-zero. All logic lives in the CLI module.

use pgbridge::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
