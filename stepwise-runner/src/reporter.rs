// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn collected test executions into report records.
//!
//! The main type here is [`Reporter`]. For each logical test in an [`ExecutionReport`], it
//! selects the attempts to report, assembles a [`ReportRecord`] for each, and hands the records
//! to a [`ReportWriter`].

mod aggregator;
mod assembler;
mod events;
pub mod junit;
mod status;

pub use aggregator::*;
pub use assembler::*;
pub use events::*;
pub use status::*;

use crate::{errors::ReportError, metadata::MetadataIndex};
use std::{convert::Infallible, error};
use stepwise_report::ReportRecord;
use tracing::debug;
use uuid::Uuid;

/// Persists report records.
pub trait ReportWriter {
    /// The error returned when a record can't be written.
    type Error: error::Error + Send + Sync + 'static;

    /// Writes a single record.
    fn write_record(&mut self, record: ReportRecord) -> Result<(), Self::Error>;
}

impl ReportWriter for Vec<ReportRecord> {
    type Error = Infallible;

    fn write_record(&mut self, record: ReportRecord) -> Result<(), Self::Error> {
        self.push(record);
        Ok(())
    }
}

/// Counts from a reporting pass.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ReportSummary {
    /// The number of logical tests.
    pub tests: usize,

    /// The number of records handed to the writer.
    pub records_written: usize,

    /// The number of attempts not reported because a retry of the same test succeeded.
    pub suppressed_attempts: usize,
}

/// Generates report records from an [`ExecutionReport`].
#[derive(Clone, Debug)]
pub struct Reporter {
    uuid_source: fn() -> Uuid,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    /// Creates a reporter assigning random record IDs.
    pub fn new() -> Self {
        Self {
            uuid_source: Uuid::new_v4,
        }
    }

    /// Creates a reporter that takes record IDs from `uuid_source`.
    pub fn with_uuid_source(uuid_source: fn() -> Uuid) -> Self {
        Self { uuid_source }
    }

    /// Runs a reporting pass.
    ///
    /// Per-test data problems, such as malformed step payloads, never fail the pass. It fails only
    /// if the writer does, or if the execution report is structurally invalid.
    pub fn generate<W: ReportWriter>(
        &self,
        report: &ExecutionReport,
        metadata: &MetadataIndex,
        writer: &mut W,
    ) -> Result<ReportSummary, ReportError> {
        let mut summary = ReportSummary::default();

        for (identity, attempts) in report.group_by_identity() {
            let selection = select(attempts)?;
            summary.tests += 1;
            summary.suppressed_attempts += selection.suppressed();

            for attempt in selection.reported() {
                let record =
                    assemble_record((self.uuid_source)(), attempt, metadata.get(identity));
                debug!(
                    "for `{identity}`, writing record with status {}",
                    record.status
                );
                writer
                    .write_record(record)
                    .map_err(|err| ReportError::Write {
                        test: identity.clone(),
                        err: Box::new(err),
                    })?;
                summary.records_written += 1;
            }
        }

        Ok(summary)
    }
}
