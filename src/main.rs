//! Cktlab - circuit simulator command line
//!
//! Runs one analysis on a schematic editor netlist and prints the result
//! as JSON.
//!
//! # Usage
//!
//! ```bash
//! cktlab divider.json dc
//! cktlab rc.json tran --points 100 --stop 5m --probe out
//! RUST_LOG=cktlab_core=debug cktlab filter.json ac --fstart 10 --fstop 100k --source Vin
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cktlab_core::{
    error::{Result, SimError},
    netlist::parse_number,
    Circuit, Netlist,
};
use tracing_subscriber::EnvFilter;

/// Circuit simulator for schematic editor netlists
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON netlist
    #[arg(value_name = "NETLIST_FILE")]
    netlist_file: PathBuf,

    /// Analysis to run
    #[command(subcommand)]
    analysis: Analysis,
}

#[derive(Subcommand, Debug)]
enum Analysis {
    /// DC operating point
    Dc,
    /// Transient analysis
    Tran {
        /// Number of output intervals
        #[arg(long, default_value_t = 100)]
        points: usize,
        /// Start time, engineering notation allowed
        #[arg(long, default_value = "0", value_parser = engineering)]
        start: f64,
        /// Stop time, engineering notation allowed
        #[arg(long, value_parser = engineering)]
        stop: f64,
        /// Node that gets truncation error control
        #[arg(long = "probe", value_name = "NODE")]
        probes: Vec<String>,
        /// Start from zero instead of the operating point
        #[arg(long)]
        no_dc: bool,
    },
    /// Small-signal frequency sweep
    Ac {
        /// Points per decade
        #[arg(long, default_value_t = 10)]
        points_per_decade: usize,
        /// Start frequency in Hz
        #[arg(long, value_parser = engineering)]
        fstart: f64,
        /// Stop frequency in Hz
        #[arg(long, value_parser = engineering)]
        fstop: f64,
        /// Name of the exciting source
        #[arg(long)]
        source: String,
    },
}

fn engineering(text: &str) -> std::result::Result<f64, String> {
    parse_number(text).ok_or_else(|| format!("'{}' is not a number", text))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let netlist = Netlist::from_file(&args.netlist_file)?;
    let mut circuit = Circuit::from_netlist(&netlist)?;

    let json = match args.analysis {
        Analysis::Dc => serde_json::to_string_pretty(&circuit.dc()?),
        Analysis::Tran {
            points,
            start,
            stop,
            probes,
            no_dc,
        } => serde_json::to_string_pretty(&circuit.tran(points, start, stop, probes.as_slice(), no_dc)?),
        Analysis::Ac {
            points_per_decade,
            fstart,
            fstop,
            source,
        } => serde_json::to_string_pretty(&circuit.ac(points_per_decade, fstart, fstop, &source)?),
    }
    .map_err(SimError::from)?;

    println!("{}", json);
    Ok(())
}
