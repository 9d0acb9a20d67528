// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by stepwise.
//!
//! Per-test data problems (malformed payloads, failing listeners) are recovered locally and only
//! logged. The errors here that escape to callers are contract violations or I/O failures of
//! external collaborators.

use crate::reporter::TestIdentity;
use camino::Utf8PathBuf;
use std::{error, fmt};
use thiserror::Error;

/// An error that occurred while decoding a step payload.
///
/// Returned by [`try_decode_steps`](crate::steps::try_decode_steps). The lenient
/// [`decode_steps`](crate::steps::decode_steps) entry point never returns this, and logs it
/// instead.
#[derive(Debug, Error)]
#[error("failed to decode step payload at line {line}, column {column}")]
pub struct StepsDecodeError {
    line: usize,
    column: usize,
    #[source]
    err: serde_json::Error,
}

impl StepsDecodeError {
    pub(crate) fn new(err: serde_json::Error) -> Self {
        Self {
            line: err.line(),
            column: err.column(),
            err,
        }
    }

    /// Returns the line at which decoding failed, 1-based.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Returns the column at which decoding failed, 1-based.
    pub fn column(&self) -> usize {
        self.column
    }
}

/// An error returned by a listener callback.
///
/// Listener errors are logged by the fan-out and never prevent other listeners from running.
#[derive(Debug, Error)]
#[error("listener `{listener}` failed")]
pub struct ListenerError {
    listener: String,
    #[source]
    err: Box<dyn error::Error + Send + Sync>,
}

impl ListenerError {
    /// Creates a new `ListenerError` for the listener with the given name.
    pub fn new(
        listener: impl Into<String>,
        err: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            listener: listener.into(),
            err: err.into(),
        }
    }

    /// Returns the name of the listener that failed.
    pub fn listener(&self) -> &str {
        &self.listener
    }
}

/// An error that occurred while writing a raw device log.
#[derive(Debug, Error)]
#[error("failed to write device log to `{path}`")]
pub struct LogWriteError {
    path: Utf8PathBuf,
    #[source]
    err: std::io::Error,
}

impl LogWriteError {
    /// Creates a new `LogWriteError`.
    pub fn new(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self {
            path: path.into(),
            err,
        }
    }
}

/// The input to retry aggregation violated its contract.
///
/// This is a programming error in the caller, not a problem with test data.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum AggregateError {
    /// No attempts were provided for a test that was asked to be reported.
    #[error("no execution attempts to aggregate")]
    NoAttempts,

    /// Attempts for more than one logical test were provided together.
    #[error("attempt for `{found}` was grouped with attempts for `{expected}`")]
    MixedIdentities {
        /// The identity of the first attempt.
        expected: TestIdentity,

        /// The identity that did not match.
        found: TestIdentity,
    },
}

/// An error that occurred during a reporting pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    /// The attempts could not be aggregated.
    #[error("failed to aggregate attempts")]
    Aggregate(#[from] AggregateError),

    /// The report writer failed to accept a record.
    #[error("failed to write report record for `{test}`")]
    Write {
        /// The test whose record could not be written.
        test: TestIdentity,

        /// The underlying error.
        #[source]
        err: Box<dyn error::Error + Send + Sync>,
    },
}

/// An error that occurred while parsing a steps configuration.
#[derive(Debug, Error)]
#[error("failed to parse steps config at `{source_name}`")]
pub struct ConfigParseError {
    source_name: String,
    #[source]
    err: toml::de::Error,
}

impl ConfigParseError {
    pub(crate) fn new(source_name: impl Into<String>, err: toml::de::Error) -> Self {
        Self {
            source_name: source_name.into(),
            err,
        }
    }
}

/// A severity name was not recognized.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown severity `{input}` (known: blocker, critical, normal, minor, trivial)")]
pub struct UnknownSeverityError {
    input: String,
}

impl UnknownSeverityError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Displays an error along with its chain of causes.
///
/// ```text
/// listener `artifacts` failed
///   caused by:
///   - disk full
/// ```
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(err) = source {
            write!(f, "\n  - {err}")?;
            source = err.source();
        }

        Ok(())
    }
}
