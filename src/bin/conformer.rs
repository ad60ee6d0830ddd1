//! Conformer CLI Binary
//!
//! Template compliance checking and remediation from the command line.

use clap::Parser;
use conformer::tooling::cli::{run, Cli};
use std::process;

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
