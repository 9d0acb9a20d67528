// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Step payloads: where they come from, and how they are decoded.
//!
//! Instrumentation reports steps either by writing them to the device log (see
//! [`logcat`](crate::logcat)), or directly as an entry in the test's metrics map. Both paths
//! produce a [`StepPayload`], which is decoded by [`decode_steps`].

mod decode;
mod metrics;

pub use decode::*;
pub use metrics::*;

use crate::{attachment::ArtifactOrigin, errors::ListenerError, reporter::TestIdentity};
use std::{collections::BTreeMap, fmt};
use tracing::info;

/// The payload that stands in for a missing or blank one.
pub const EMPTY_STEPS_JSON: &str = "[]";

/// The flat key/value metrics map reported for a finished test.
pub type TestMetrics = BTreeMap<String, String>;

/// Where a step payload was obtained from.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum PayloadSource {
    /// The payload was reported in the test's metrics map.
    Metrics,

    /// The payload was reconstructed from the device log.
    LogStream,
}

impl fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadSource::Metrics => write!(f, "metrics"),
            PayloadSource::LogStream => write!(f, "log stream"),
        }
    }
}

/// The raw JSON text of a step payload, along with where it came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StepPayload {
    source: PayloadSource,
    json: String,
}

impl StepPayload {
    /// Creates a new payload.
    pub fn new(source: PayloadSource, json: impl Into<String>) -> Self {
        Self {
            source,
            json: json.into(),
        }
    }

    /// Where the payload came from.
    pub fn source(&self) -> PayloadSource {
        self.source
    }

    /// The JSON text of the payload.
    pub fn json(&self) -> &str {
        &self.json
    }
}

/// Chooses the payload to use for a test when both ingestion paths may have produced one.
///
/// A non-blank payload in the metrics map wins, and is logged. Otherwise the payload
/// reconstructed from the device log is used, if any.
pub fn resolve_payload(
    test: &TestIdentity,
    metrics: &TestMetrics,
    metrics_key: &str,
    stream_payload: Option<String>,
) -> Option<StepPayload> {
    match metrics.get(metrics_key) {
        Some(json) if !json.trim().is_empty() => {
            info!("for `{test}`, found step payload in metrics key `{metrics_key}`");
            Some(StepPayload::new(PayloadSource::Metrics, json.clone()))
        }
        _ => stream_payload
            .filter(|json| !json.trim().is_empty())
            .map(|json| StepPayload::new(PayloadSource::LogStream, json)),
    }
}

/// Receives the steps decoded for each finished test.
///
/// Called synchronously, once per test, in registration order.
pub trait StepsListener: Send + Sync {
    /// Called with the steps decoded for a test.
    ///
    /// `payload` is the payload the steps were decoded from, or `None` if the test reported no
    /// steps.
    fn on_steps(
        &self,
        origin: &ArtifactOrigin<'_>,
        payload: Option<&StepPayload>,
        steps: &DecodedSteps,
    ) -> Result<(), ListenerError>;
}
