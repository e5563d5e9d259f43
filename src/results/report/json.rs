//! JSON report generation module.

use crate::results::{report::Generator, AnalysisOutcome};
use anyhow::{Context, Result};
use log::debug;
use serde_json::ser;
use std::io::Write;

/// JSON report generator.
#[derive(Debug, Default)]
pub struct Json;

impl Json {
    /// Creates a new JSON report generator.
    pub fn new() -> Self {
        Self
    }
}

impl Generator for Json {
    fn generate(&mut self, outcome: &AnalysisOutcome, out: &mut dyn Write) -> Result<()> {
        debug!("Writing JSON report");
        ser::to_writer(&mut *out, outcome).context("could not serialize the report")?;
        writeln!(out)?;
        Ok(())
    }
}
