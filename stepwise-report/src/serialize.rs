// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a `ReportRecord`.

use crate::{ReportRecord, SerializeError};
use serde::Serialize;
use std::io;

static INDENT: &[u8] = b"  ";

pub(crate) fn serialize_record(
    record: &ReportRecord,
    mut writer: impl io::Write,
) -> Result<(), SerializeError> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    Serialize::serialize(record, &mut serializer)?;

    // Add a trailing newline.
    writer.write_all(b"\n")?;
    Ok(())
}
