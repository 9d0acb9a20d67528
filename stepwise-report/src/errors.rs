// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An error that occurs while serializing a [`ReportRecord`](crate::ReportRecord).
///
/// Returned by [`ReportRecord::serialize`](crate::ReportRecord::serialize) and
/// [`ReportRecord::to_string`](crate::ReportRecord::to_string).
#[derive(Debug, Error)]
#[error("error serializing report record")]
pub struct SerializeError {
    #[from]
    inner: serde_json::Error,
}

impl From<std::io::Error> for SerializeError {
    fn from(error: std::io::Error) -> Self {
        Self {
            inner: serde_json::Error::io(error),
        }
    }
}
