//! Report generation module.

mod json;

use crate::results::AnalysisOutcome;
use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

pub use self::json::Json;

/// Trait that represents a type that can generate a report.
pub trait Generator {
    /// Generates an actual report into the given writer.
    fn generate(&mut self, outcome: &AnalysisOutcome, out: &mut dyn Write) -> Result<()>;

    /// Generates the report into a newly created file.
    fn generate_file(&mut self, outcome: &AnalysisOutcome, path: &Path) -> Result<()> {
        let f = File::create(path)
            .with_context(|| format!("could not create report file {}", path.display()))?;
        let mut out = BufWriter::new(f);
        self.generate(outcome, &mut out)?;
        out.flush()
            .with_context(|| format!("could not write report file {}", path.display()))?;
        Ok(())
    }
}
