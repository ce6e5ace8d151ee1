use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::open_input;
use crate::timestamp::{Realigner, Realignment};

/// Action line written before every document
pub const CREATE_ACTION: &str = r#"{ "create": {} }"#;

/// Counters for one conversion
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConversionStats {
    pub lines_read: usize,
    pub blank_lines: usize,
    pub skipped_invalid: usize,
    pub documents_written: usize,
    pub timestamps_realigned: usize,
    pub timestamps_fallback: usize,
}

impl ConversionStats {
    fn record(&mut self, outcome: &Realignment) {
        match outcome {
            Realignment::Absent => {}
            Realignment::Realigned(_) => self.timestamps_realigned += 1,
            Realignment::Fallback { .. } => self.timestamps_fallback += 1,
        }
    }
}

/// Rewrites NDJSON records into bulk `create` pairs
pub struct BulkConverter {
    realigner: Realigner,
    progress: ProgressBar,
}

impl BulkConverter {
    pub fn new(realigner: Realigner) -> Self {
        Self {
            realigner,
            progress: ProgressBar::hidden(),
        }
    }

    /// Tick the given bar once per input line
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Convert every line of `reader` into `writer`
    pub fn convert<R: BufRead, W: Write>(
        &self,
        reader: R,
        mut writer: W,
    ) -> Result<ConversionStats> {
        let mut stats = ConversionStats::default();

        for (idx, line) in reader.lines().enumerate() {
            let line_num = idx + 1;
            let line = line.with_context(|| format!("Failed to read line {}", line_num))?;
            stats.lines_read += 1;
            self.progress.inc(1);

            let line = line.trim();
            if line.is_empty() {
                stats.blank_lines += 1;
                continue;
            }

            let mut doc: Value = match serde_json::from_str(line) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Skipping invalid JSON at line {}: {}", line_num, e);
                    stats.skipped_invalid += 1;
                    continue;
                }
            };

            let outcome = self.realigner.apply(&mut doc);
            stats.record(&outcome);

            writeln!(writer, "{}", CREATE_ACTION).context("Failed to write action line")?;
            serde_json::to_writer(&mut writer, &doc).context("Failed to write document")?;
            writer.write_all(b"\n").context("Failed to write document")?;
            stats.documents_written += 1;
        }

        writer.flush().context("Failed to flush output")?;
        debug!("Conversion stats: {:?}", stats);
        Ok(stats)
    }

    /// Convert `input` (plain or `.gz`) into a freshly truncated `output`
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<ConversionStats> {
        info!("Converting {} -> {}", input.display(), output.display());

        let reader = open_input(input)?;
        let file = File::create(output)
            .with_context(|| format!("Failed to create output file {}", output.display()))?;

        let stats = self
            .convert(reader, BufWriter::new(file))
            .with_context(|| format!("Error processing {}", input.display()))?;

        info!(
            "Wrote {} documents ({} invalid lines skipped, {} timestamp fallbacks)",
            stats.documents_written, stats.skipped_invalid, stats.timestamps_fallback
        );
        Ok(stats)
    }
}
