//! Where book snapshots and tunables come from.

use anyhow::{Context, Result};
use lockcurve_engine::{BookSnapshot, SegmentBook, SimulatorConfig};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    File(PathBuf),
}

impl Source {
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" { Source::Stdin } else { Source::File(PathBuf::from(arg)) }
    }

    fn read(&self) -> Result<String> {
        match self {
            Source::Stdin => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).context("reading snapshot from stdin")?;
                Ok(buf)
            }
            Source::File(path) => std::fs::read_to_string(path).with_context(|| format!("reading snapshot {}", path.display())),
        }
    }
}

pub struct Books {
    pub up: SegmentBook,
    pub down: SegmentBook,
}

pub fn load_books(source: &Source) -> Result<Books> {
    let raw = source.read()?;
    let snapshot = BookSnapshot::parse(&raw).context("parsing book snapshot")?;
    let (up, down) = snapshot.into_books().context("validating book snapshot")?;
    info!(spot = %up.spot().to_ui_string(), up = up.len(), down = down.len(), "loaded snapshot");
    Ok(Books { up, down })
}

/// Defaults when no file is given; missing keys fall back to defaults too.
pub fn load_config(path: Option<&Path>) -> Result<SimulatorConfig> {
    let Some(path) = path else { return Ok(SimulatorConfig::default()) };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    SimulatorConfig::from_json(&raw).with_context(|| format!("parsing config {}", path.display()))
}
