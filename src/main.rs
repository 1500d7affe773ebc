//! tinqer CLI binary
//!
//! Reads a LINQ-style arrow-chain query source (file, `-t`/`--text`
//! argument, or stdin), compiles it against a declared schema, and prints
//! the resulting SQL and parameter map.

use tinqer::cli::run_cli;
use std::process;

fn main() {
    let exit_code = run_cli();
    process::exit(exit_code);
}
