use anyhow::{Context, Result};

use log::{error, info, warn, LevelFilter};

use retriever::retriever::Branch;

use std::fs::OpenOptions;
use std::path::Path;

/// Set up env_logger. `RUST_LOG`, when set, refines the level picked by `-v`.
pub fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format_timestamp_secs();

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("Could not open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}

/// Outcome of every root path given on the command line
#[derive(Default)]
pub struct Report {
    roots: Vec<(String, Branch)>,
}

impl Report {
    pub fn push(&mut self, path: String, outcome: Branch) {
        self.roots.push((path, outcome));
    }

    /// True if every root yielded content.
    pub fn all_found(&self) -> bool {
        self.roots.iter().all(|(_, outcome)| outcome.is_found())
    }

    /// Log one line per root.
    pub fn log(&self) {
        for (path, outcome) in &self.roots {
            match outcome {
                Branch::Found => info!("done: {}", path),
                Branch::Missing => warn!("no content: {}", path),
                Branch::Failed(err) => error!("failed: {}: {:#}", path, err),
            }
        }
    }
}
