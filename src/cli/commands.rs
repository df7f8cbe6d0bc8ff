use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use http::Method;
use serde::Deserialize;
use tracing::debug;

use crate::router::{Destination, RouteTable};

/// Command-line interface for inspecting route tables
#[derive(Parser, Debug)]
#[command(name = "brrtdispatch-probe")]
#[command(about = "Inspect and exercise a brrtdispatch route table", long_about = None)]
pub struct Cli {
    /// YAML route file
    #[arg(short, long, env = "BRRTD_ROUTES")]
    pub routes: PathBuf,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print every route in match order, then the fallback
    Routes,
    /// Match one request against the table
    Match {
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request path, optionally with a query string
        #[arg(short, long)]
        path: String,
    },
}

/// Top-level route file document.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteFile {
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
    #[serde(default)]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    pub method: String,
    pub pattern: String,
    pub name: String,
}

impl RouteFile {
    /// Compile into a table whose destinations are named no-op handlers.
    ///
    /// # Errors
    ///
    /// Invalid methods or patterns, with the offending entry in the context.
    pub fn to_table(&self) -> Result<RouteTable> {
        let mut table = RouteTable::new();
        for (idx, entry) in self.routes.iter().enumerate() {
            let method = parse_method(&entry.method)
                .with_context(|| format!("route #{idx} ({})", entry.name))?;
            table
                .map(method, &entry.pattern, probe_destination(&entry.name))
                .with_context(|| format!("route #{idx} ({})", entry.name))?;
        }
        if let Some(name) = &self.fallback {
            table.register_fallback(probe_destination(name));
        }
        Ok(table)
    }
}

fn probe_destination(name: &str) -> Destination {
    Destination::handler(name, |_ctx| Ok(()))
}

fn parse_method(raw: &str) -> Result<Method> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{raw}'"))
}

/// Read and compile a route file.
///
/// # Errors
///
/// I/O, YAML or route compilation failures.
pub fn load_route_file(path: &Path) -> Result<RouteTable> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read route file {}", path.display()))?;
    let file: RouteFile = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse route file {}", path.display()))?;
    debug!(
        path = %path.display(),
        routes = file.routes.len(),
        has_fallback = file.fallback.is_some(),
        "Route file loaded"
    );
    file.to_table()
}

/// Parse process arguments and write results to stdout.
///
/// # Errors
///
/// See [`run_cli_to`].
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_cli_to(&cli, &mut out)
}

/// Execute `cli`, writing human-readable output to `out`.
///
/// # Errors
///
/// Route file failures, an invalid `--method`, or a write failure.
pub fn run_cli_to<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    let table = load_route_file(&cli.routes)?;
    match &cli.command {
        Commands::Routes => {
            for line in table.describe() {
                writeln!(out, "{line}")?;
            }
        }
        Commands::Match { method, path } => {
            let method = parse_method(method)?;
            let path_only = path.split_once('?').map_or(path.as_str(), |(p, _)| p);
            match table.try_match(&method, path_only) {
                Some(route_match) => {
                    match route_match.pattern {
                        Some(pattern) => writeln!(
                            out,
                            "matched: {} ({pattern})",
                            route_match.destination.name()
                        )?,
                        None => writeln!(out, "fallback: {}", route_match.destination.name())?,
                    }
                    for (name, value) in route_match.route_data.iter() {
                        writeln!(out, "  {name} = {value}")?;
                    }
                }
                None => writeln!(out, "no match: {method} {path_only}")?,
            }
        }
    }
    Ok(())
}
