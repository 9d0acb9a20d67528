// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for step capture.
//!
//! The defaults match the emission format of the on-device step reporter. Changing them is only
//! needed when the instrumentation is customized.

use crate::errors::ConfigParseError;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// The marker that precedes each step payload fragment in the device log.
pub const DEFAULT_START_MARKER: &str = "#AllureStepsInfoJson#:";

/// The log tag under which the step reporter writes.
pub const DEFAULT_PRODUCER_TAG: &str = "I/KASPRESSO: ";

/// The metrics key under which instrumentation reports a step payload directly.
pub const DEFAULT_METRICS_KEY: &str = "marathon.stepsResultsJson";

/// Log lines that signal the instrumentation finished running a test.
pub const DEFAULT_END_SENTINELS: &[&str] = &["TestRunner: failed", "TestRunner: finished"];

/// Configuration for extracting step payloads.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct StepsCaptureConfig {
    /// The substring marking the start of a payload fragment.
    pub start_marker: String,

    /// The log tag of the step reporter.
    ///
    /// Buffered lines carrying this tag are the reporter's own non-payload output, and are
    /// dropped rather than folded into the payload.
    pub producer_tag: String,

    /// Substrings that signal the end of a test's output.
    pub end_sentinels: Vec<String>,

    /// The metrics key holding a directly reported payload.
    pub metrics_key: String,

    /// Whether buffered lines that look like another subsystem's log output are dropped.
    pub drop_foreign_lines: bool,
}

impl Default for StepsCaptureConfig {
    fn default() -> Self {
        Self {
            start_marker: DEFAULT_START_MARKER.to_owned(),
            producer_tag: DEFAULT_PRODUCER_TAG.to_owned(),
            end_sentinels: DEFAULT_END_SENTINELS
                .iter()
                .map(|&s| s.to_owned())
                .collect(),
            metrics_key: DEFAULT_METRICS_KEY.to_owned(),
            drop_foreign_lines: true,
        }
    }
}

impl StepsCaptureConfig {
    /// Parses a configuration from TOML text.
    ///
    /// `source_name` is used in error messages, and is typically the path the text was read from.
    /// Unknown keys are ignored with a warning.
    pub fn from_toml_str(source_name: &str, text: &str) -> Result<Self, ConfigParseError> {
        let mut unknown = BTreeSet::new();
        let table: toml::Table = text
            .parse()
            .map_err(|err| ConfigParseError::new(source_name, err))?;
        let mut cb = |path: serde_ignored::Path| {
            unknown.insert(path.to_string());
        };
        let config = serde_ignored::deserialize(toml::Value::Table(table), &mut cb)
            .map_err(|err| ConfigParseError::new(source_name, err))?;

        for key in &unknown {
            warn!("in config `{source_name}`, ignoring unknown key `{key}`");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = StepsCaptureConfig::from_toml_str("empty", "").expect("empty config parses");
        assert_eq!(config, StepsCaptureConfig::default());
        assert_eq!(
            config.end_sentinels,
            vec!["TestRunner: failed", "TestRunner: finished"]
        );
    }

    #[test]
    fn overrides_and_unknown_keys() {
        let text = indoc! {r##"
            start-marker = "#MARK#:"
            producer-tag = "I/TAG: "
            drop-foreign-lines = false
            not-a-key = 42
        "##};

        let config = StepsCaptureConfig::from_toml_str("custom.toml", text)
            .expect("config with unknown key parses");
        assert_eq!(config.start_marker, "#MARK#:");
        assert_eq!(config.producer_tag, "I/TAG: ");
        assert!(!config.drop_foreign_lines);
        assert_eq!(config.metrics_key, DEFAULT_METRICS_KEY);
    }

    #[test]
    fn invalid_type() {
        let error = StepsCaptureConfig::from_toml_str("bad.toml", "end-sentinels = 5")
            .expect_err("wrong type fails");
        assert_eq!(
            error.to_string(),
            "failed to parse steps config at `bad.toml`"
        );
    }
}
