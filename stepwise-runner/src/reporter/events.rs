// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test executions as seen by the reporter.
//!
//! An [`ExecutionReport`] is the closed set of [`TestExecutionAttempt`]s collected during a run.
//! Attempts for the same [`TestIdentity`] are retries of one logical test.

use crate::{
    attachment::{Attachment, TestArtifacts},
    steps::{DecodedSteps, StepPayload, decode_steps},
};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use std::fmt;

/// The identity of a logical test.
///
/// Attempts of the same test across retries, devices and historical runs share an identity.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TestIdentity {
    package: String,
    class: String,
    method: String,
}

impl TestIdentity {
    /// Creates a new identity.
    pub fn new(
        package: impl Into<String>,
        class: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
            method: method.into(),
        }
    }

    /// The package the test class lives in. May be empty.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The simple name of the test class.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The name of the test method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the suite this test belongs to: the package-qualified class name.
    pub fn suite(&self) -> String {
        if self.package.is_empty() {
            self.class.clone()
        } else {
            format!("{}.{}", self.package, self.class)
        }
    }

    /// Returns a rendering of this identity that is safe to use in report file names and IDs.
    ///
    /// Characters other than ASCII alphanumerics and `._#-$` are replaced with `_`.
    pub fn full_name(&self) -> String {
        format!("{}#{}", self.suite(), self.method)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || "._#-$".contains(c) {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.suite(), self.method)
    }
}

/// The identifier of the device pool an attempt ran in.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DevicePoolId(String);

impl DevicePoolId {
    /// Creates a new pool identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DevicePoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The device an attempt ran on.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DeviceInfo {
    serial_number: String,
    model: Option<String>,
}

impl DeviceInfo {
    /// Creates a new `DeviceInfo` with the given serial number.
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            model: None,
        }
    }

    /// Sets the device model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The serial number of the device.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// The device model, if known.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

/// The outcome of an attempt, as reported by the instrumentation.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum TestStatus {
    /// The test passed.
    Passed,

    /// An assertion in the test failed.
    Failure,

    /// The test did not run to completion, e.g. because the process crashed.
    Incomplete,

    /// An assumption in the test did not hold, so the test was not evaluated.
    AssumptionFailure,

    /// The test was ignored.
    Ignored,

    /// The instrumentation reported a status this version does not know about.
    Unrecognized,
}

impl TestStatus {
    /// Parses a status name such as `passed` or `assumption-failure`.
    ///
    /// Matching is ASCII case-insensitive, and `_` is accepted in place of `-`. Unknown names
    /// parse to [`TestStatus::Unrecognized`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "passed" => TestStatus::Passed,
            "failure" => TestStatus::Failure,
            "incomplete" => TestStatus::Incomplete,
            "assumption-failure" => TestStatus::AssumptionFailure,
            "ignored" => TestStatus::Ignored,
            _ => TestStatus::Unrecognized,
        }
    }

    /// Returns true if this outcome means the test does not need to be retried.
    ///
    /// Ignored tests and failed assumptions count as successes: retrying them would not change
    /// the outcome.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            TestStatus::Passed | TestStatus::Ignored | TestStatus::AssumptionFailure
        )
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Passed => "passed",
            TestStatus::Failure => "failure",
            TestStatus::Incomplete => "incomplete",
            TestStatus::AssumptionFailure => "assumption-failure",
            TestStatus::Ignored => "ignored",
            TestStatus::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}

/// One concrete run of a test on one device.
///
/// Attempts are immutable once constructed.
#[derive(Clone, Debug)]
pub struct TestExecutionAttempt {
    identity: TestIdentity,
    pool_id: DevicePoolId,
    device: DeviceInfo,
    status: TestStatus,
    start_time: DateTime<FixedOffset>,
    stop_time: DateTime<FixedOffset>,
    attachments: Vec<Attachment>,
    step_payload: Option<StepPayload>,
    steps: DecodedSteps,
    stacktrace: Option<String>,
}

impl TestExecutionAttempt {
    /// Creates a new attempt with no attachments, steps or stack trace.
    pub fn new(
        identity: TestIdentity,
        pool_id: DevicePoolId,
        device: DeviceInfo,
        status: TestStatus,
        start_time: DateTime<FixedOffset>,
        stop_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            identity,
            pool_id,
            device,
            status,
            start_time,
            stop_time,
            attachments: Vec::new(),
            step_payload: None,
            steps: DecodedSteps::default(),
            stacktrace: None,
        }
    }

    /// Sets the attachments produced by this attempt.
    pub fn with_attachments(mut self, attachments: impl IntoIterator<Item = Attachment>) -> Self {
        self.attachments = attachments.into_iter().collect();
        self
    }

    /// Sets the step payload reported by this attempt, decoding it.
    ///
    /// A malformed payload is logged here, once. See [`decode_steps`].
    pub fn with_step_payload(mut self, payload: StepPayload) -> Self {
        self.steps = decode_steps(&self.identity, payload.json());
        self.step_payload = Some(payload);
        self
    }

    /// Sets the failure stack trace.
    pub fn with_stacktrace(mut self, stacktrace: impl Into<String>) -> Self {
        self.stacktrace = Some(stacktrace.into());
        self
    }

    /// Sets the attachments, step payload and steps from artifacts collected while the test ran.
    ///
    /// The steps were decoded when they were published, and are not decoded again.
    pub fn with_artifacts(mut self, artifacts: TestArtifacts) -> Self {
        let (attachments, step_payload, steps) = artifacts.into_parts();
        self.attachments = attachments;
        self.step_payload = step_payload;
        self.steps = steps;
        self
    }

    /// The identity of the logical test.
    pub fn identity(&self) -> &TestIdentity {
        &self.identity
    }

    /// The device pool the attempt ran in.
    pub fn pool_id(&self) -> &DevicePoolId {
        &self.pool_id
    }

    /// The device the attempt ran on.
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// The outcome of the attempt.
    pub fn status(&self) -> TestStatus {
        self.status
    }

    /// When the attempt started.
    pub fn start_time(&self) -> DateTime<FixedOffset> {
        self.start_time
    }

    /// When the attempt finished.
    pub fn stop_time(&self) -> DateTime<FixedOffset> {
        self.stop_time
    }

    /// Files produced by the attempt, in the order they were attached.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// The step payload reported by the attempt, if any.
    pub fn step_payload(&self) -> Option<&StepPayload> {
        self.step_payload.as_ref()
    }

    /// The steps decoded from the step payload. Empty if there was no payload.
    pub fn steps(&self) -> &DecodedSteps {
        &self.steps
    }

    /// The failure stack trace, if any.
    pub fn stacktrace(&self) -> Option<&str> {
        self.stacktrace.as_deref()
    }
}

/// All attempts collected during a run, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct ExecutionReport {
    attempts: Vec<TestExecutionAttempt>,
}

impl ExecutionReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attempt.
    pub fn push(&mut self, attempt: TestExecutionAttempt) {
        self.attempts.push(attempt);
    }

    /// Returns all attempts in arrival order.
    pub fn attempts(&self) -> &[TestExecutionAttempt] {
        &self.attempts
    }

    /// Returns the number of attempts.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Returns true if no attempts were recorded.
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Groups attempts by logical test.
    ///
    /// Groups are ordered by the first arrival of each test, and attempts within a group keep
    /// their arrival order.
    pub fn group_by_identity(&self) -> IndexMap<&TestIdentity, Vec<&TestExecutionAttempt>> {
        let mut groups: IndexMap<_, Vec<_>> = IndexMap::new();
        for attempt in &self.attempts {
            groups.entry(attempt.identity()).or_default().push(attempt);
        }
        groups
    }
}

impl FromIterator<TestExecutionAttempt> for ExecutionReport {
    fn from_iter<T: IntoIterator<Item = TestExecutionAttempt>>(iter: T) -> Self {
        Self {
            attempts: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use chrono::TimeZone;

    /// Builds an attempt on device `emulator-5554` in pool `omni`, starting at `start_secs`.
    pub(crate) fn attempt(
        identity: &TestIdentity,
        status: TestStatus,
        start_secs: i64,
    ) -> TestExecutionAttempt {
        let offset = FixedOffset::east_opt(0).expect("UTC offset is valid");
        let start = offset
            .timestamp_opt(1_700_000_000 + start_secs, 0)
            .single()
            .expect("timestamp is valid");
        TestExecutionAttempt::new(
            identity.clone(),
            DevicePoolId::new("omni"),
            DeviceInfo::new("emulator-5554"),
            status,
            start,
            start + chrono::Duration::seconds(3),
        )
    }
}
