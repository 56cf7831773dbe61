//! # lefdefinfo
//!
//! LEF, Verilog & DEF Design Statistics
//!

use clap::Parser;
use log::LevelFilter;
use std::error::Error;

use lefdef21::Database;

// => The doc-comment on `ProgramOptions` here is displayed by the `clap`-generated help docs =>

/// Load a LEF library, Verilog netlist, and DEF placement, and report design statistics
#[derive(Parser)]
struct ProgramOptions {
    /// LEF Input File(s), loaded in order
    #[clap(short, long, required = true)]
    lef: Vec<String>,
    /// Verilog Netlist Input File
    #[clap(short = 'n', long)]
    verilog: Option<String>,
    /// DEF Placement Input File
    #[clap(short, long)]
    def: Option<String>,
    /// Verbose Output Mode
    #[clap(short, long)]
    verbose: bool,
}

/// The main entry point.
/// All logic is offloaded to `_main` for sake of testing.
fn main() -> Result<(), Box<dyn Error>> {
    let options = ProgramOptions::parse();
    _main(&options)
}

/// All the real logic, with `ProgramOptions` argument for sake of testing
fn _main(options: &ProgramOptions) -> Result<(), Box<dyn Error>> {
    let level = if options.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    // `RUST_LOG` overrides the default level. Repeated initialization, e.g. across tests, is ignored.
    let _ = env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .try_init();

    let mut db = Database::new();
    for lef in options.lef.iter() {
        db.load_library(lef)?;
    }
    println!("{}", db.library_summary());

    if let Some(verilog) = &options.verilog {
        db.load_netlist(verilog)?;
    }
    if let Some(def) = &options.def {
        db.load_placement(def)?;
    }
    if options.verilog.is_some() || options.def.is_some() {
        println!("{}", db.summary());
    }
    Ok(())
}
