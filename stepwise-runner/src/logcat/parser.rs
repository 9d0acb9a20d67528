// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconstruction of step payloads from interleaved device log lines.
//!
//! The step reporter writes its JSON payload in fragments, each on a line containing the start
//! marker. Other subsystems log concurrently, so lines that belong to no fragment show up in
//! between, and long fragments may wrap onto lines that carry no marker at all.
//!
//! Lines seen after a fragment are held in an uncommitted tail until it is known what follows
//! them. The tail is committed when the next fragment arrives, when the test's output ends, or
//! when the payload is taken. On commit, each buffered line is either folded into the payload
//! or dropped as noise, according to the [`LineClassifier`].

use super::classify::LineClassifier;
use crate::config::StepsCaptureConfig;
use tracing::warn;

/// The state of payload reconstruction.
///
/// Transitions consume the old state and return the new one, so the state machine can be
/// driven and inspected without a log stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParserState {
    /// Scanning for a start marker. Lines are ignored for payload purposes.
    Disarmed(PayloadBuffers),

    /// A payload is in progress. Lines without a marker are buffered in the tail.
    Armed(PayloadBuffers),
}

impl Default for ParserState {
    fn default() -> Self {
        ParserState::Disarmed(PayloadBuffers::default())
    }
}

impl ParserState {
    /// Advances the state machine by one line.
    pub fn feed(self, line: &str, classifier: &LineClassifier) -> Self {
        match (self, classifier.payload_fragment(line)) {
            (ParserState::Disarmed(buffers) | ParserState::Armed(buffers), Some(fragment)) => {
                let mut buffers = buffers.commit_tail(classifier);
                buffers.payload.push_str(fragment);
                ParserState::Armed(buffers)
            }
            (ParserState::Armed(buffers), None) if classifier.is_end_sentinel(line) => {
                ParserState::Disarmed(buffers.commit_tail(classifier))
            }
            (ParserState::Armed(mut buffers), None) => {
                buffers.tail.push(line.to_owned());
                ParserState::Armed(buffers)
            }
            (state @ ParserState::Disarmed(_), None) => state,
        }
    }

    /// Ends reconstruction, returning the payload if a non-blank one was seen.
    pub fn finish(self, classifier: &LineClassifier) -> Option<String> {
        let buffers = match self {
            ParserState::Disarmed(buffers) => buffers,
            ParserState::Armed(buffers) => buffers.commit_tail(classifier),
        };
        (!buffers.payload.trim().is_empty()).then_some(buffers.payload)
    }

    /// Returns true if a payload is in progress.
    pub fn is_armed(&self) -> bool {
        matches!(self, ParserState::Armed(_))
    }

    /// Returns the buffers backing this state.
    pub fn buffers(&self) -> &PayloadBuffers {
        match self {
            ParserState::Disarmed(buffers) | ParserState::Armed(buffers) => buffers,
        }
    }
}

/// The buffers carried through parser state transitions.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PayloadBuffers {
    payload: String,
    tail: Vec<String>,
    dropped: usize,
}

impl PayloadBuffers {
    /// Returns the payload accumulated so far, excluding the uncommitted tail.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Returns the lines buffered since the last fragment.
    pub fn tail(&self) -> &[String] {
        &self.tail
    }

    /// Returns the number of buffered lines dropped as noise.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn commit_tail(mut self, classifier: &LineClassifier) -> Self {
        for line in std::mem::take(&mut self.tail) {
            match classifier.noise_kind(&line) {
                Some(kind) => {
                    warn!("skipping line in step payload ({kind}): {line}");
                    self.dropped += 1;
                }
                None => self.payload.push_str(&line),
            }
        }
        self
    }
}

/// Extracts at most one step payload from the log lines of a single test.
#[derive(Clone, Debug, Default)]
pub struct StepPayloadParser {
    classifier: LineClassifier,
    state: ParserState,
}

impl StepPayloadParser {
    /// Creates a new parser in the disarmed state.
    pub fn new(classifier: LineClassifier) -> Self {
        Self {
            classifier,
            state: ParserState::default(),
        }
    }

    /// Creates a new parser from the given configuration.
    pub fn from_config(config: &StepsCaptureConfig) -> Self {
        Self::new(LineClassifier::new(config))
    }

    /// Feeds a line of device log output to the parser.
    ///
    /// Trailing line terminators are ignored.
    pub fn feed(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        let state = std::mem::take(&mut self.state);
        self.state = state.feed(line, &self.classifier);
    }

    /// Returns true if a payload is in progress.
    pub fn is_armed(&self) -> bool {
        self.state.is_armed()
    }

    /// Returns the number of buffered lines dropped as noise so far.
    pub fn dropped_lines(&self) -> usize {
        self.state.buffers().dropped()
    }

    /// Returns the current state.
    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// Consumes the parser, returning the reconstructed payload if one was seen.
    pub fn finish(self) -> Option<String> {
        self.state.finish(&self.classifier)
    }

    /// Returns the reconstructed payload if one was seen, and resets the parser.
    pub fn take_payload(&mut self) -> Option<String> {
        std::mem::take(&mut self.state).finish(&self.classifier)
    }

    /// Discards any partial payload and returns to the disarmed state.
    pub fn reset(&mut self) {
        self.state = ParserState::default();
    }
}
