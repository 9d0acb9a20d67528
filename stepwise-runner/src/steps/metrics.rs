// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{DecodedSteps, StepPayload, TestMetrics, decode_steps, resolve_payload};
use crate::{
    attachment::{ArtifactOrigin, AttachmentCollector},
    config::StepsCaptureConfig,
    reporter::TestIdentity,
};

/// Returns the step payload stored under `metrics_key`, if present and non-blank.
pub fn metrics_payload(
    test: &TestIdentity,
    metrics: &TestMetrics,
    metrics_key: &str,
) -> Option<StepPayload> {
    resolve_payload(test, metrics, metrics_key, None)
}

/// Decodes the steps stored under `metrics_key` in a finished test's metrics.
///
/// A missing key means the test reported no steps.
pub fn extract_steps(
    test: &TestIdentity,
    metrics: &TestMetrics,
    metrics_key: &str,
) -> DecodedSteps {
    match metrics_payload(test, metrics, metrics_key) {
        Some(payload) => decode_steps(test, payload.json()),
        None => DecodedSteps::default(),
    }
}

/// Publishes steps from test metrics, for runs where the device log is not captured.
#[derive(Debug)]
pub struct MetricsStepsListener {
    metrics_key: String,
    collector: AttachmentCollector,
}

impl MetricsStepsListener {
    /// Creates a new listener publishing to the steps listeners registered on `collector`.
    pub fn new(config: &StepsCaptureConfig, collector: AttachmentCollector) -> Self {
        Self {
            metrics_key: config.metrics_key.clone(),
            collector,
        }
    }

    /// Called when a test finishes, with the metrics it reported.
    pub fn test_ended(&self, origin: &ArtifactOrigin<'_>, metrics: &TestMetrics) {
        let payload = metrics_payload(origin.test, metrics, &self.metrics_key);
        let steps = match &payload {
            Some(payload) => decode_steps(origin.test, payload.json()),
            None => DecodedSteps::default(),
        };
        self.collector.publish_steps(origin, payload.as_ref(), &steps);
    }
}
