// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    Attachment, Parameter, SerializeError, Stage, Status, StatusDetails, StepRecord,
    serialize::serialize_record,
};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::io;
use uuid::Uuid;

/// A single reported test execution.
///
/// This is the document handed to report writers. Once assembled it is not mutated further.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ReportRecord {
    /// A unique identifier for this record.
    pub uuid: Uuid,

    /// A stable identifier correlating this test across historical runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,

    /// The fully qualified, report-safe name of the test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    /// The short display name of the test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The outcome of the test.
    pub status: Status,

    /// Failure details. Present if and only if a failure trace exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,

    /// The lifecycle stage of the test.
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

    /// Steps reported by the instrumentation, in order.
    pub steps: Vec<StepRecord>,

    /// Files attached to this test.
    pub attachments: Vec<Attachment>,

    /// Parameters the test ran with.
    pub parameters: Vec<Parameter>,

    /// Labels used to group and filter tests.
    pub labels: Vec<Label>,

    /// Links to issue trackers and test management systems.
    pub links: Vec<Link>,
}

impl ReportRecord {
    /// Creates a new record with the given identifier and status.
    pub fn new(uuid: Uuid, status: Status) -> Self {
        Self {
            uuid,
            history_id: None,
            full_name: None,
            name: None,
            status,
            status_details: None,
            stage: Stage::Finished,
            description: None,
            start: None,
            stop: None,
            steps: vec![],
            attachments: vec![],
            parameters: vec![],
            labels: vec![],
            links: vec![],
        }
    }

    /// Sets the history ID.
    pub fn set_history_id(&mut self, history_id: impl Into<String>) -> &mut Self {
        self.history_id = Some(history_id.into());
        self
    }

    /// Sets the full name.
    pub fn set_full_name(&mut self, full_name: impl Into<String>) -> &mut Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Sets the display name.
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the status details.
    pub fn set_status_details(&mut self, status_details: StatusDetails) -> &mut Self {
        self.status_details = Some(status_details);
        self
    }

    /// Sets the description.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the start time.
    pub fn set_start(&mut self, start: impl Into<DateTime<FixedOffset>>) -> &mut Self {
        self.start = Some(start.into().timestamp_millis());
        self
    }

    /// Sets the stop time.
    pub fn set_stop(&mut self, stop: impl Into<DateTime<FixedOffset>>) -> &mut Self {
        self.stop = Some(stop.into().timestamp_millis());
        self
    }

    /// Sets the steps, replacing any existing ones.
    pub fn set_steps(&mut self, steps: impl IntoIterator<Item = StepRecord>) -> &mut Self {
        self.steps = steps.into_iter().collect();
        self
    }

    /// Adds an attachment.
    pub fn add_attachment(&mut self, attachment: Attachment) -> &mut Self {
        self.attachments.push(attachment);
        self
    }

    /// Adds a label.
    pub fn add_label(&mut self, label: Label) -> &mut Self {
        self.labels.push(label);
        self
    }

    /// Adds several labels.
    pub fn add_labels(&mut self, labels: impl IntoIterator<Item = Label>) -> &mut Self {
        self.labels.extend(labels);
        self
    }

    /// Adds a link.
    pub fn add_link(&mut self, link: Link) -> &mut Self {
        self.links.push(link);
        self
    }

    /// Returns the value of the first label with the given name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.value.as_str())
    }

    /// Serialize this record as JSON to the given writer.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serialize_record(self, writer)
    }

    /// Serialize this record to a JSON string.
    pub fn to_string(&self) -> Result<String, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        String::from_utf8(buf).map_err(|error| {
            SerializeError::from(io::Error::new(io::ErrorKind::InvalidData, error))
        })
    }
}

/// A name/value pair used to group and filter tests.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Label {
    /// The name of the label.
    pub name: String,

    /// The value of the label.
    pub value: String,
}

impl Label {
    /// Label name for the host (device) a test ran on.
    pub const HOST: &'static str = "host";
    /// Label name for the test's package.
    pub const PACKAGE: &'static str = "package";
    /// Label name for the test's class.
    pub const TEST_CLASS: &'static str = "testClass";
    /// Label name for the test's method.
    pub const TEST_METHOD: &'static str = "testMethod";
    /// Label name for the test's suite.
    pub const SUITE: &'static str = "suite";
    /// Label name for an epic.
    pub const EPIC: &'static str = "epic";
    /// Label name for a feature.
    pub const FEATURE: &'static str = "feature";
    /// Label name for a story.
    pub const STORY: &'static str = "story";
    /// Label name for a severity level.
    pub const SEVERITY: &'static str = "severity";
    /// Label name for an owner.
    pub const OWNER: &'static str = "owner";

    /// Creates a new label.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl<T> From<(T, T)> for Label
where
    T: Into<String>,
{
    fn from((name, value): (T, T)) -> Self {
        Label::new(name, value)
    }
}

/// A link to an external system.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Link {
    /// The display name of the link.
    pub name: String,

    /// The target of the link.
    pub url: String,

    /// The kind of link, e.g. `issue` or `tms`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
}

impl Link {
    /// Creates a link to an issue tracker.
    pub fn issue(url: impl Into<String>) -> Self {
        Self {
            name: "Issue".to_owned(),
            url: url.into(),
            link_type: Some("issue".to_owned()),
        }
    }

    /// Creates a link to a test management system.
    pub fn tms(url: impl Into<String>) -> Self {
        Self {
            name: "TMS".to_owned(),
            url: url.into(),
            link_type: Some("tms".to_owned()),
        }
    }
}
