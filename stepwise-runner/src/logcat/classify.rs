// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of device log lines for payload extraction.

use crate::config::StepsCaptureConfig;
use regex::Regex;
use std::{fmt, sync::LazyLock};

/// Matches the header of a log line in logcat's `brief` format, e.g. `D/Choreographer( 123): `.
static BRIEF_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[VDIWEFA]/[^\s:(][^:(]*(\(\s*\d+\))?: ").expect("brief header regex is valid")
});

/// Matches the header of a log line in logcat's `threadtime` format, e.g.
/// `10-19 12:00:00.000  1234  1240 D Choreographer: `.
static THREADTIME_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d{3}\s+\d+\s+\d+\s+[VDIWEFA]\s+[^:]*: ")
        .expect("threadtime header regex is valid")
});

/// Why a buffered line was not folded into a payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NoiseKind {
    /// The line carries the step reporter's own tag, but no payload marker.
    ProducerOutput,

    /// The line is log output from another subsystem.
    ForeignLogLine,
}

impl fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseKind::ProducerOutput => write!(f, "step reporter output without payload marker"),
            NoiseKind::ForeignLogLine => write!(f, "log output from another source"),
        }
    }
}

/// Rules for recognizing payload fragments, end-of-test lines and noise.
#[derive(Clone, Debug)]
pub struct LineClassifier {
    start_marker: String,
    producer_tag: String,
    end_sentinels: Vec<String>,
    drop_foreign_lines: bool,
}

impl LineClassifier {
    /// Creates a classifier from the given configuration.
    pub fn new(config: &StepsCaptureConfig) -> Self {
        Self {
            start_marker: config.start_marker.clone(),
            producer_tag: config.producer_tag.clone(),
            end_sentinels: config.end_sentinels.clone(),
            drop_foreign_lines: config.drop_foreign_lines,
        }
    }

    /// Returns the text after the start marker, if the line contains one.
    ///
    /// An empty start marker never matches.
    pub fn payload_fragment<'a>(&self, line: &'a str) -> Option<&'a str> {
        if self.start_marker.is_empty() {
            return None;
        }
        line.find(&self.start_marker)
            .map(|index| &line[index + self.start_marker.len()..])
    }

    /// Returns true if the line signals that the instrumentation finished running a test.
    pub fn is_end_sentinel(&self, line: &str) -> bool {
        self.end_sentinels
            .iter()
            .any(|sentinel| !sentinel.is_empty() && line.contains(sentinel.as_str()))
    }

    /// Returns the kind of noise a buffered line is, or `None` if it continues the payload.
    pub fn noise_kind(&self, line: &str) -> Option<NoiseKind> {
        if !self.producer_tag.is_empty() && line.contains(self.producer_tag.as_str()) {
            Some(NoiseKind::ProducerOutput)
        } else if self.drop_foreign_lines
            && (BRIEF_HEADER.is_match(line) || THREADTIME_HEADER.is_match(line))
        {
            Some(NoiseKind::ForeignLogLine)
        } else {
            None
        }
    }
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new(&StepsCaptureConfig::default())
    }
}
