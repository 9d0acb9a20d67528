// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::events::TestStatus;
use stepwise_report::Status;

/// Maps the outcome of an attempt to the status shown in reports.
///
/// If the attempt's step payload was malformed, the attempt is reported as failed whatever its
/// outcome: its recorded state can't be trusted.
pub fn map_status(status: TestStatus, steps_malformed: bool) -> Status {
    if steps_malformed {
        return Status::Failed;
    }
    match status {
        TestStatus::Passed => Status::Passed,
        TestStatus::Failure => Status::Failed,
        TestStatus::Incomplete => Status::Broken,
        TestStatus::AssumptionFailure | TestStatus::Ignored | TestStatus::Unrecognized => {
            Status::Skipped
        }
    }
}
