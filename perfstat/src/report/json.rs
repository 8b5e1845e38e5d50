use std::io::{self, Stdout, Write};

use anyhow::{Context, Result};

use super::Reporter;
use crate::collector::Batch;

/// One JSON document per batch, newline delimited
pub struct JsonReporter<W: Write + Send> {
    out: W,
}

impl JsonReporter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn report(&mut self, batch: &Batch) -> Result<()> {
        serde_json::to_writer(&mut self.out, batch).context("serializing batch")?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
