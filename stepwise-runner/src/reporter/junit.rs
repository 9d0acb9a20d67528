// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code to generate JUnit XML reports from execution reports.

use super::{
    aggregator::select,
    events::{ExecutionReport, TestExecutionAttempt},
    status::map_status,
};
use crate::errors::AggregateError;
use indexmap::IndexMap;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use stepwise_report::Status;

/// Builds a JUnit report from the attempts selected for reporting.
///
/// There is one test suite per package-qualified class, and one test case per reported attempt.
pub fn build_junit_report(
    name: &str,
    report: &ExecutionReport,
) -> Result<Report, AggregateError> {
    let mut test_suites: IndexMap<String, TestSuite> = IndexMap::new();

    for (identity, attempts) in report.group_by_identity() {
        let selection = select(attempts)?;
        let suite_name = identity.suite();
        let test_suite = test_suites
            .entry(suite_name.clone())
            .or_insert_with(|| TestSuite::new(suite_name));
        for attempt in selection.reported() {
            test_suite.add_test_case(test_case(attempt));
        }
    }

    let mut junit = Report::new(name);
    junit.add_test_suites(test_suites.into_values());
    Ok(junit)
}

fn test_case(attempt: &TestExecutionAttempt) -> TestCase {
    let identity = attempt.identity();
    let mut status = match map_status(attempt.status(), attempt.steps().is_malformed()) {
        Status::Passed => TestCaseStatus::success(),
        Status::Skipped => TestCaseStatus::skipped(),
        Status::Failed | Status::Broken | Status::Unknown => {
            TestCaseStatus::non_success(NonSuccessKind::Failure)
        }
    };
    if let Some(trace) = attempt.stacktrace() {
        status
            .set_message(trace.lines().next().unwrap_or_default())
            .set_description(trace);
    }

    let elapsed = (attempt.stop_time() - attempt.start_time())
        .to_std()
        .unwrap_or_default();
    let mut test_case = TestCase::new(identity.method(), status);
    test_case
        .set_classname(identity.suite())
        .set_timestamp(attempt.start_time())
        .set_time(elapsed);
    test_case
}
