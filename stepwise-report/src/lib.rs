// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Data model for step-aware test report documents.
//!
//! A [`ReportRecord`] describes one reported test execution: its identity, timing, status,
//! attachments, labels, and the nested [`StepRecord`]s that the instrumentation reported while
//! the test ran. Records serialize to the JSON result format understood by report viewers.
//!
//! Step payloads produced by instrumentation are read with [`StepRecord`]'s `Deserialize`
//! implementation. Unknown [`Status`] and [`Stage`] values decode to their `Unknown` variants
//! instead of failing the whole payload.

mod errors;
mod record;
mod serialize;
mod step;

pub use errors::*;
pub use record::*;
pub use step::*;
