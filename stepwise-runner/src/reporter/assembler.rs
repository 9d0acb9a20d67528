// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    events::{TestExecutionAttempt, TestIdentity},
    status::map_status,
};
use crate::metadata::{MetadataKey, TestMetadata};
use stepwise_report::{Label, Link, ReportRecord, StatusDetails};
use uuid::Uuid;
use xxhash_rust::xxh3::Xxh3;

/// Returns the history ID of a test.
///
/// The history ID depends only on the package-qualified class and the method, so every run of
/// the same test on any device, pool or date shares it.
pub fn history_id(test: &TestIdentity) -> String {
    let mut hasher = Xxh3::new();
    hasher.update(test.suite().as_bytes());
    hasher.update(b"\0");
    hasher.update(test.method().as_bytes());
    format!("{:016x}", hasher.digest())
}

/// Builds the report record for an attempt selected for reporting.
pub fn assemble_record(
    uuid: Uuid,
    attempt: &TestExecutionAttempt,
    metadata: Option<&TestMetadata>,
) -> ReportRecord {
    let test = attempt.identity();
    let steps = attempt.steps();

    let mut record = ReportRecord::new(uuid, map_status(attempt.status(), steps.is_malformed()));
    record
        .set_history_id(history_id(test))
        .set_full_name(test.full_name())
        .set_name(test.method())
        .set_start(attempt.start_time())
        .set_stop(attempt.stop_time())
        .set_steps(steps.steps().iter().cloned())
        .add_labels([
            Label::new(Label::HOST, attempt.device().serial_number()),
            Label::new(Label::PACKAGE, test.package()),
            Label::new(Label::TEST_CLASS, test.class()),
            Label::new(Label::TEST_METHOD, test.method()),
            Label::new(Label::SUITE, test.suite()),
        ]);

    if let Some(trace) = attempt.stacktrace() {
        record.set_status_details(StatusDetails::from_trace(trace));
    }

    for attachment in attempt.attachments() {
        record.add_attachment(stepwise_report::Attachment::new(
            attachment.kind().display_name(),
            attachment.file().as_str(),
            attachment.mime_type(),
        ));
    }

    for (key, value) in metadata.into_iter().flat_map(TestMetadata::iter) {
        match key {
            MetadataKey::Description => {
                record.set_description(value);
            }
            MetadataKey::Issue => {
                record.add_link(Link::issue(value));
            }
            MetadataKey::TmsLink => {
                record.add_link(Link::tms(value));
            }
            MetadataKey::Epic => {
                record.add_label(Label::new(Label::EPIC, value));
            }
            MetadataKey::Feature => {
                record.add_label(Label::new(Label::FEATURE, value));
            }
            MetadataKey::Story => {
                record.add_label(Label::new(Label::STORY, value));
            }
            MetadataKey::Severity => {
                record.add_label(Label::new(Label::SEVERITY, value));
            }
            MetadataKey::Owner => {
                record.add_label(Label::new(Label::OWNER, value));
            }
        }
    }

    record
}
