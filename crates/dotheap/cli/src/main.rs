// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! DotHeap CLI
//!
//! Loads a JSON heap graph document, analyses it, and prints query results.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{DotheapConfig, OutputFormat};
use dotheap_core::Reachability;
use dotheap_core::heapdump::InstanceId;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dotheap")]
#[command(about = "DotHeap - heap snapshot analysis")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file (TOML, overrides $DOTHEAP_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Weakest reachability counted in site statistics
    #[arg(long, global = true)]
    retained: Option<Reachability>,

    /// Output format
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Heap totals and reachability counts
    Summary {
        /// Graph document (JSON)
        graph: PathBuf,
    },
    /// Instances dominated by the GC roots, largest first
    Rooted {
        /// Graph document (JSON)
        graph: PathBuf,
    },
    /// Details of one instance
    Instance {
        /// Graph document (JSON)
        graph: PathBuf,
        /// Instance id, decimal or 0x-prefixed hex
        #[arg(value_parser = commands::parse_instance_id)]
        id: InstanceId,
    },
    /// Path from a GC root to an instance
    Path {
        /// Graph document (JSON)
        graph: PathBuf,
        /// Instance id, decimal or 0x-prefixed hex
        #[arg(value_parser = commands::parse_instance_id)]
        id: InstanceId,
    },
    /// Allocation site statistics
    Sites {
        /// Graph document (JSON)
        graph: PathBuf,
        /// Site id, the root site if absent or unknown
        #[arg(default_value_t = 0)]
        site: u64,
    },
    /// Compare two graphs
    Diff {
        /// Baseline graph document (JSON)
        baseline: PathBuf,
        /// Current graph document (JSON)
        current: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = DotheapConfig::resolve_config(cli.config, cli.retained, cli.format)?;
    let analysis = config.analysis;
    let output = &config.output;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Summary { graph } => commands::summary(&commands::load_snapshot(&graph, analysis)?, output, &mut out)?,
        Commands::Rooted { graph } => commands::rooted(&commands::load_snapshot(&graph, analysis)?, output, &mut out)?,
        Commands::Instance { graph, id } => commands::instance(&commands::load_snapshot(&graph, analysis)?, id, output, &mut out)?,
        Commands::Path { graph, id } => commands::path(&commands::load_snapshot(&graph, analysis)?, id, output, &mut out)?,
        Commands::Sites { graph, site } => commands::sites(&commands::load_snapshot(&graph, analysis)?, site, output, &mut out)?,
        Commands::Diff { baseline, current } => {
            let baseline = commands::load_snapshot(&baseline, analysis)?;
            let current = commands::load_snapshot(&current, analysis)?;
            commands::diff(&baseline, &current, output, &mut out)?
        }
    }
    out.flush()?;
    Ok(())
}
