// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::EMPTY_STEPS_JSON;
use crate::{
    errors::{DisplayErrorChain, StepsDecodeError},
    reporter::TestIdentity,
};
use stepwise_report::StepRecord;
use tracing::error;

/// Steps decoded from a payload, and whether the payload was malformed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedSteps {
    steps: Vec<StepRecord>,
    malformed: bool,
}

impl DecodedSteps {
    /// The decoded steps, in reported order. Empty if the payload was malformed.
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Returns true if the payload could not be decoded.
    pub fn is_malformed(&self) -> bool {
        self.malformed
    }

    /// Consumes self, returning the decoded steps.
    pub fn into_steps(self) -> Vec<StepRecord> {
        self.steps
    }
}

/// Decodes a step payload, returning an error if it is not a JSON array of steps.
///
/// Unknown status and stage names decode to their `Unknown` variants. A blank payload decodes to
/// no steps.
pub fn try_decode_steps(json: &str) -> Result<Vec<StepRecord>, StepsDecodeError> {
    let json = if json.trim().is_empty() {
        EMPTY_STEPS_JSON
    } else {
        json
    };
    serde_json::from_str(json).map_err(StepsDecodeError::new)
}

/// Decodes a step payload reported by `test`.
///
/// This never fails: a malformed payload is logged along with its text, and decodes to no steps
/// with [`DecodedSteps::is_malformed`] set.
pub fn decode_steps(test: &TestIdentity, json: &str) -> DecodedSteps {
    match try_decode_steps(json) {
        Ok(steps) => DecodedSteps {
            steps,
            malformed: false,
        },
        Err(err) => {
            error!("for `{test}`, {}: {json}", DisplayErrorChain::new(&err));
            DecodedSteps {
                steps: Vec::new(),
                malformed: true,
            }
        }
    }
}
