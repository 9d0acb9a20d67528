// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The outcome of a test or step, as shown by report viewers.
///
/// # Deserialization
///
/// Unrecognized status names deserialize to [`Status::Unknown`], as does `null`. Values that are
/// not strings at all are still rejected, so a structurally broken payload fails to decode.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum Status {
    /// The test or step passed.
    Passed,

    /// The test or step failed an assertion.
    Failed,

    /// The test or step was interrupted by an unexpected error.
    Broken,

    /// The test or step did not run.
    Skipped,

    /// The status was missing or not recognized.
    #[default]
    Unknown,
}

impl Status {
    /// Returns the name this status serializes as.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Broken => "broken",
            Status::Skipped => "skipped",
            Status::Unknown => "unknown",
        }
    }

    /// Parses a status name, falling back to [`Status::Unknown`] for anything unrecognized.
    ///
    /// Matching is ASCII case-insensitive.
    pub fn from_name(name: &str) -> Self {
        [Status::Passed, Status::Failed, Status::Broken, Status::Skipped]
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(Status::Unknown)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(name.map_or(Status::Unknown, |name| Status::from_name(&name)))
    }
}

/// The lifecycle stage a step had reached when it was reported.
///
/// Deserializes leniently in the same way as [`Status`].
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum Stage {
    /// The step was scheduled but had not started.
    Scheduled,

    /// The step was still running.
    Running,

    /// The step ran to completion.
    Finished,

    /// The step was waiting on something.
    Pending,

    /// The step was interrupted.
    Interrupted,

    /// The stage was missing or not recognized.
    #[default]
    Unknown,
}

impl Stage {
    /// Returns the name this stage serializes as.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Scheduled => "scheduled",
            Stage::Running => "running",
            Stage::Finished => "finished",
            Stage::Pending => "pending",
            Stage::Interrupted => "interrupted",
            Stage::Unknown => "unknown",
        }
    }

    /// Parses a stage name, falling back to [`Stage::Unknown`] for anything unrecognized.
    pub fn from_name(name: &str) -> Self {
        [
            Stage::Scheduled,
            Stage::Running,
            Stage::Finished,
            Stage::Pending,
            Stage::Interrupted,
        ]
        .into_iter()
        .find(|stage| stage.as_str().eq_ignore_ascii_case(name.trim()))
        .unwrap_or(Stage::Unknown)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(name.map_or(Stage::Unknown, |name| Stage::from_name(&name)))
    }
}

/// A reported sub-unit of a test's execution.
///
/// Steps nest: each step may contain an ordered list of child steps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct StepRecord {
    /// The name of the step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The outcome of the step.
    pub status: Status,

    /// Failure details for the step, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,

    /// The lifecycle stage of the step.
    pub stage: Stage,

    /// A free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Start time, in milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    /// Stop time, in milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,

    /// Child steps, in reported order.
    pub steps: Vec<StepRecord>,

    /// Files attached to this step.
    pub attachments: Vec<Attachment>,

    /// Parameters the step ran with.
    pub parameters: Vec<Parameter>,
}

impl StepRecord {
    /// Creates a new step with the given name and status.
    pub fn new(name: impl Into<String>, status: Status) -> Self {
        Self {
            name: Some(name.into()),
            status,
            ..Default::default()
        }
    }

    /// Sets the stage.
    pub fn set_stage(&mut self, stage: Stage) -> &mut Self {
        self.stage = stage;
        self
    }

    /// Sets the start and stop times, in milliseconds since the Unix epoch.
    pub fn set_times(&mut self, start: i64, stop: i64) -> &mut Self {
        self.start = Some(start);
        self.stop = Some(stop);
        self
    }

    /// Adds a child step.
    pub fn add_step(&mut self, step: StepRecord) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Returns the total number of steps in this tree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.steps.iter().map(StepRecord::count).sum::<usize>()
    }
}

/// Failure details for a test or step.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusDetails {
    /// A short failure message, typically the first line of the trace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The full failure trace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl StatusDetails {
    /// Creates status details from a stack trace.
    ///
    /// The message is the first line of the trace, and the trace is kept verbatim.
    pub fn from_trace(trace: impl Into<String>) -> Self {
        let trace = trace.into();
        let message = trace.lines().next().unwrap_or_default().to_owned();
        Self {
            message: Some(message),
            trace: Some(trace),
        }
    }
}

/// A file attached to a test or step.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    /// The display name of the attachment.
    pub name: String,

    /// Where the attachment's contents live.
    pub source: String,

    /// The MIME type of the contents.
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl Attachment {
    /// Creates a new attachment.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// A named parameter.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    /// The name of the parameter.
    pub name: String,

    /// The value of the parameter.
    pub value: String,
}

impl<T> From<(T, T)> for Parameter
where
    T: Into<String>,
{
    fn from((name, value): (T, T)) -> Self {
        Parameter {
            name: name.into(),
            value: value.into(),
        }
    }
}
