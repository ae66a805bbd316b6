//! Ring advancement engine.
//!
//! `decide` is a pure function of the current state, the ring configuration,
//! the operator flags and the clock. Its only side effects are the ones it
//! delegates: running the validation command and promoting ring directories.
//! The caller persists the returned state and acts on the returned action.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::errors::RolloutError;
use super::flags::ControlFlags;
use super::state::{Action, Decision, RolloutState};
use crate::config::RingConfig;
use crate::rings::{PromoteResult, RingPropagation};
use crate::validation::ValidationGate;

pub const ABORTED_BY_OPERATOR: &str = "aborted by operator";
pub const VALIDATION_FAILED: &str = "validation failed";

/// Decide what happens to a rollout on this tick.
///
/// Precedence, first match wins:
/// 1. terminal state: nothing to do
/// 2. operator abort
/// 3. operator pause
/// 4. dwell time not yet elapsed (skipped by fastlane)
/// 5. validation command (skipped by ignore-validation), retried up to the
///    configured limit before aborting
/// 6. promotion of the current ring, aborting on a version-marker mismatch
///
/// Errors are fatal to the invocation: an unrunnable validation shell or a
/// filesystem failure while promoting.
pub fn decide(
    state: &RolloutState,
    config: &RingConfig,
    flags: ControlFlags,
    now: DateTime<Utc>,
    validate: &dyn ValidationGate,
    propagate: &dyn RingPropagation,
) -> Result<Decision, RolloutError> {
    if state.is_terminal() {
        return Ok(Decision::new(state.clone(), Action::None));
    }

    if flags.aborted {
        let mut next = state.clone();
        next.abort(ABORTED_BY_OPERATOR);
        info!(rollout = %config.name, ring = state.current_ring, "rollout aborted by operator");
        return Ok(Decision::new(next, Action::Abort));
    }

    if flags.paused {
        debug!(rollout = %config.name, ring = state.current_ring, "rollout paused");
        return Ok(Decision::new(state.clone(), Action::None));
    }

    if !flags.fastlane && !wait_elapsed(state, now) {
        debug!(
            rollout = %config.name,
            ring = state.current_ring,
            since = %state.last_rollout_timestamp,
            "ring still within its wait duration"
        );
        return Ok(Decision::new(state.clone(), Action::Wait));
    }

    let mut next = state.clone();

    if let Some(command) = config.validation_command.as_deref() {
        if !flags.ignore_validation {
            let result = validate.run(command)?;
            next.last_validation_output = Some(result.output);

            if !result.success {
                if state.validation_retry_count < config.validation_max_retries {
                    next.validation_retry_count += 1;
                    warn!(
                        rollout = %config.name,
                        ring = state.current_ring,
                        attempt = next.validation_retry_count,
                        max_retries = config.validation_max_retries,
                        "validation failed, will retry"
                    );
                    return Ok(Decision::new(next, Action::RetryValidation));
                }

                next.abort(VALIDATION_FAILED);
                warn!(
                    rollout = %config.name,
                    ring = state.current_ring,
                    "validation failed with no retries left, aborting"
                );
                return Ok(Decision::new(next, Action::Abort));
            }

            next.validation_retry_count = 0;
        }
    }

    match propagate.promote(state.current_ring, &state.source_version)? {
        PromoteResult::Promoted { to_ring } => {
            next.current_ring = to_ring;
            next.last_rollout_timestamp = now;
            next.validation_retry_count = 0;
            info!(
                rollout = %config.name,
                ring = to_ring,
                total = next.total_rings(),
                version = %state.source_version,
                "advanced rollout"
            );
            Ok(Decision::new(next, Action::Advance))
        }
        mismatch @ PromoteResult::VersionMismatch { .. } => {
            let reason = mismatch
                .reason()
                .unwrap_or_else(|| "ring version mismatch".to_string());
            warn!(rollout = %config.name, ring = state.current_ring, %reason, "aborting rollout");
            next.abort(reason);
            Ok(Decision::new(next, Action::Abort))
        }
    }
}

fn wait_elapsed(state: &RolloutState, now: DateTime<Utc>) -> bool {
    let Some(wait) = state.current_wait() else {
        return true;
    };
    // A clock that went backwards counts as no time elapsed.
    let elapsed = (now - state.last_rollout_timestamp)
        .to_std()
        .unwrap_or_default();
    elapsed >= wait
}
