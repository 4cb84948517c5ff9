// src/process/stage.rs
//
// Per-year pipeline: scan (count + encoding), plan the sample, then decode
// in a second pass. The two passes cannot overlap because a valid draw
// needs the total row count first. Everything here is synchronous and
// strictly in input order; sampling state and the writer both depend on it.

use std::{path::Path, sync::atomic::Ordering, time::Instant};
use tracing::{info, instrument};

use crate::config::SampleSettings;
use crate::error::StageError;
use crate::process::decode::{decode_line, CoercePolicy};
use crate::process::encoding::{self, LineReader};
use crate::process::sample::{seeded_rng, SamplePlan, Verdict};
use crate::process::write::RecordWriter;
use crate::process::CancelFlag;
use crate::schema::YearSchema;

#[derive(Debug, Clone, Copy, Default)]
pub struct StageSummary {
    /// Physical lines visited before any early sampling exit.
    pub total_lines: u64,
    pub emitted: u64,
    pub blank: u64,
}

#[instrument(level = "info", skip_all, fields(raw = %raw_path.display()))]
pub fn stage_year(
    schema: &YearSchema,
    raw_path: &Path,
    writer: &mut dyn RecordWriter,
    sample: &SampleSettings,
    policy: CoercePolicy,
    cancel: &CancelFlag,
) -> Result<StageSummary, StageError> {
    let start = Instant::now();

    // Pass 1: count rows and settle the file encoding.
    let scan = encoding::scan(raw_path, cancel)?;
    info!(
        lines = scan.total_lines,
        blank = scan.total_lines - scan.data_lines,
        encoding = scan.encoding.label(),
        "scanned source"
    );

    let mut plan = if sample.enabled {
        let universe = if sample.count_blank_lines {
            scan.total_lines
        } else {
            scan.data_lines
        };
        let mut rng = seeded_rng(sample.seed);
        let plan = SamplePlan::draw(universe, sample.size_for(universe), &mut rng);
        info!(targets = plan.remaining(), universe, "sample planned");
        Some(plan)
    } else {
        None
    };

    writer.write_header(&schema.names())?;

    // Pass 2: decode in input order.
    let mut reader = LineReader::open(raw_path, scan.encoding)?;
    let mut summary = StageSummary::default();
    let mut ordinal = 0u64;

    while let Some(line) = reader.next_line()? {
        if cancel.load(Ordering::Relaxed) {
            return Err(StageError::Cancelled);
        }
        summary.total_lines += 1;

        if sample.count_blank_lines {
            // Historical behavior: ordinals count physical lines, and the
            // target comparison happens before the blank check, so a
            // target landing on a blank line forfeits that draw.
            ordinal += 1;
            if let Some(plan) = &mut plan {
                match plan.visit(ordinal) {
                    Verdict::Done => break,
                    Verdict::Skip => continue,
                    Verdict::Take => {}
                }
            }
            if line.trim().is_empty() {
                summary.blank += 1;
                continue;
            }
        } else {
            if line.trim().is_empty() {
                summary.blank += 1;
                continue;
            }
            ordinal += 1;
            if let Some(plan) = &mut plan {
                match plan.visit(ordinal) {
                    Verdict::Done => break,
                    Verdict::Skip => continue,
                    Verdict::Take => {}
                }
            }
        }

        match decode_line(&line, schema, policy) {
            Ok(Some(record)) => {
                writer.write_record(&record)?;
                summary.emitted += 1;
            }
            Ok(None) => summary.blank += 1,
            Err(source) => {
                return Err(StageError::Decode {
                    line: summary.total_lines,
                    source,
                })
            }
        }
    }

    writer.finish()?;
    info!(
        emitted = summary.emitted,
        blank = summary.blank,
        elapsed = ?start.elapsed(),
        "staged"
    );
    Ok(summary)
}
