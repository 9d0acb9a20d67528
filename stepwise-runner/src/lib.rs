// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Step extraction and retry-aware reporting for Android instrumentation tests.
//!
//! While tests run, a [`LogcatListener`](logcat::LogcatListener) per device reconstructs the step
//! payload each test writes to the device log, and publishes the decoded steps and the saved log
//! through an [`AttachmentCollector`](attachment::AttachmentCollector). After the run, a
//! [`Reporter`](reporter::Reporter) selects which retries of each test to report and assembles
//! the report records.

pub mod attachment;
pub mod config;
pub mod errors;
pub mod logcat;
pub mod metadata;
pub mod output;
pub mod reporter;
pub mod steps;
