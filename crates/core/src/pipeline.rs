//! One run: read every unit, extract them in parallel, merge in order.

use crate::merge::{MergedModel, ModelBuilder};
use anyhow::{Context, Result};
use cpp_harness::{CppHarness, UnitModel};
use protocol::ExtractError;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub name: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    "{} is not valid UTF-8 (first bad byte at offset {}); invalid bytes were replaced",
                    path.display(),
                    err.utf8_error().valid_up_to()
                );
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        Ok(Self::new(path.display().to_string(), text))
    }
}

/// Reads every file. The first unreadable file fails the whole run.
pub fn read_units(paths: &[PathBuf]) -> Result<Vec<SourceUnit>> {
    paths.iter().map(|path| SourceUnit::read(path)).collect()
}

pub struct Pipeline {
    harness: CppHarness,
}

impl Pipeline {
    pub fn new(harness: CppHarness) -> Self {
        Self { harness }
    }

    pub fn harness(&self) -> &CppHarness {
        &self.harness
    }

    /// Extract all units and merge them into one model. Either every unit
    /// succeeds and the model is complete, or the first failure in input
    /// order is returned.
    pub fn run(&self, units: &[SourceUnit]) -> Result<MergedModel, ExtractError> {
        let start = Instant::now();

        let results: Vec<Result<UnitModel, ExtractError>> = units
            .par_iter()
            .map(|unit| self.harness.extract(&unit.name, &unit.text))
            .collect();

        let mut builder = ModelBuilder::new();
        for result in results {
            builder.add_unit(result?);
        }
        let merged = builder.finalize()?;

        info!(
            "Extracted {} interfaces from {} units in {:?}",
            merged.model.len(),
            merged.units,
            start.elapsed()
        );
        Ok(merged)
    }
}
