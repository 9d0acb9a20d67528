// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selection of the attempts to report for a logical test.

use super::events::{TestExecutionAttempt, TestIdentity};
use crate::errors::AggregateError;

/// The attempts chosen to report for one logical test.
///
/// Obtained via [`select`], which is the only way to construct one:
///
/// ```compile_fail
/// use stepwise_runner::reporter::RetrySelection;
///
/// let selection = RetrySelection::Failed { attempts: Vec::new() };
/// ```
#[derive(Clone, Debug)]
pub enum RetrySelection<'a> {
    /// An attempt succeeded. Only the first successful attempt is reported.
    #[non_exhaustive]
    Passed {
        /// The first successful attempt, in arrival order.
        attempt: &'a TestExecutionAttempt,

        /// The number of other attempts that are not reported.
        suppressed: usize,
    },

    /// No attempt succeeded. Every attempt is reported, in arrival order.
    #[non_exhaustive]
    Failed {
        /// All attempts. Guaranteed to be non-empty.
        attempts: Vec<&'a TestExecutionAttempt>,
    },
}

impl<'a> RetrySelection<'a> {
    /// Returns the attempts to report, in arrival order.
    pub fn reported(&self) -> Vec<&'a TestExecutionAttempt> {
        match self {
            RetrySelection::Passed { attempt, .. } => vec![*attempt],
            RetrySelection::Failed { attempts } => attempts.clone(),
        }
    }

    /// Returns the number of attempts that are not reported.
    pub fn suppressed(&self) -> usize {
        match self {
            RetrySelection::Passed { suppressed, .. } => *suppressed,
            RetrySelection::Failed { .. } => 0,
        }
    }

    /// Returns the identity of the logical test.
    pub fn identity(&self) -> &'a TestIdentity {
        match self {
            RetrySelection::Passed { attempt, .. } => attempt.identity(),
            // Non-empty by construction in `select`.
            RetrySelection::Failed { attempts } => attempts[0].identity(),
        }
    }
}

/// Selects the attempts to report out of all attempts of one logical test.
///
/// If any attempt succeeded, the first successful one is selected and the rest are suppressed.
/// Otherwise every attempt is selected, so that repeated failures stay visible.
///
/// Returns an error if there are no attempts, or if the attempts are for more than one test.
pub fn select<'a>(
    attempts: impl IntoIterator<Item = &'a TestExecutionAttempt>,
) -> Result<RetrySelection<'a>, AggregateError> {
    let attempts: Vec<_> = attempts.into_iter().collect();
    let first = attempts.first().ok_or(AggregateError::NoAttempts)?;

    if let Some(other) = attempts
        .iter()
        .find(|attempt| attempt.identity() != first.identity())
    {
        return Err(AggregateError::MixedIdentities {
            expected: first.identity().clone(),
            found: other.identity().clone(),
        });
    }

    let first_success = attempts
        .iter()
        .copied()
        .find(|attempt| attempt.status().is_success());
    match first_success {
        Some(attempt) => Ok(RetrySelection::Passed {
            attempt,
            suppressed: attempts.len() - 1,
        }),
        None => Ok(RetrySelection::Failed { attempts }),
    }
}
