//! Structured reconciliation results
//!
//! Every reconciliation call produces exactly one [`Outcome`], built once and
//! returned to the caller. The four flag combinations are deliberate:
//! success with or without a change, fatal failure, and partial progress
//! (`failed` and `changed` both set — the attempt altered remote state but
//! did not reach the desired terminal state).

use serde::Serialize;
use serde_json::{json, Value};

use crate::Error;

/// Result of one reconciliation call
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Outcome {
    /// True when the reconciliation could not reach the desired state
    pub failed: bool,

    /// True when this call altered remote state
    pub changed: bool,

    /// Remote resource data on success, or error details for diagnosis
    pub payload: Value,
}

impl Outcome {
    /// Success: the remote resource was already in the desired state
    pub fn unchanged(payload: Value) -> Self {
        Self {
            failed: false,
            changed: false,
            payload,
        }
    }

    /// Success: this call converged the remote resource to the desired state
    pub fn changed(payload: Value) -> Self {
        Self {
            failed: false,
            changed: true,
            payload,
        }
    }

    /// Failure: the desired state was not reached and nothing was altered
    pub fn fatal(payload: Value) -> Self {
        Self {
            failed: true,
            changed: false,
            payload,
        }
    }

    /// Failure with partial progress: remote state was altered but the
    /// desired terminal state was not reached. Callers should retry or
    /// escalate, not treat this as a no-op failure.
    pub fn partial(payload: Value) -> Self {
        Self {
            failed: true,
            changed: true,
            payload,
        }
    }

    /// Fold a transport or decode error into a fatal outcome.
    ///
    /// This is the boundary conversion that keeps errors from crossing the
    /// public reconciler surface.
    pub fn from_error(err: Error) -> Self {
        Self::fatal(json!({ "error": err.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_combinations() {
        assert!(!Outcome::unchanged(Value::Null).failed);
        assert!(!Outcome::unchanged(Value::Null).changed);

        assert!(!Outcome::changed(Value::Null).failed);
        assert!(Outcome::changed(Value::Null).changed);

        assert!(Outcome::fatal(Value::Null).failed);
        assert!(!Outcome::fatal(Value::Null).changed);

        assert!(Outcome::partial(Value::Null).failed);
        assert!(Outcome::partial(Value::Null).changed);
    }

    #[test]
    fn test_from_error_carries_message() {
        let outcome = Outcome::from_error(Error::transport("connection reset"));
        assert!(outcome.failed);
        assert!(!outcome.changed);
        let error = outcome.payload["error"].as_str().unwrap();
        assert!(error.contains("connection reset"));
    }
}
