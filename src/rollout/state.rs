use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::duration::millis_vec;

/// Progress of one rollout instance through its rings.
///
/// Invariant: `current_ring <= total_rings()`. The state is terminal once
/// every ring has been promoted or the rollout was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutState {
    pub current_ring: usize,
    #[serde(with = "millis_vec")]
    pub wait_durations: Vec<Duration>,
    pub last_rollout_timestamp: DateTime<Utc>,
    pub source_version: String,
    #[serde(default)]
    pub aborted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(default)]
    pub validation_retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validation_output: Option<String>,
}

impl RolloutState {
    /// State of a freshly initiated rollout: ring 0 is live as of `now`.
    pub fn new(source_version: &str, wait_durations: Vec<Duration>, now: DateTime<Utc>) -> Self {
        Self {
            current_ring: 0,
            wait_durations,
            last_rollout_timestamp: now,
            source_version: source_version.to_string(),
            aborted: false,
            abort_reason: None,
            validation_retry_count: 0,
            last_validation_output: None,
        }
    }

    pub fn total_rings(&self) -> usize {
        self.wait_durations.len()
    }

    pub fn is_completed(&self) -> bool {
        self.current_ring >= self.total_rings()
    }

    pub fn is_terminal(&self) -> bool {
        self.aborted || self.is_completed()
    }

    /// Dwell time required before the current ring may be promoted.
    pub fn current_wait(&self) -> Option<Duration> {
        self.wait_durations.get(self.current_ring).copied()
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.aborted = true;
        self.abort_reason = Some(reason.into());
    }

    /// Hand the captured validation output to the caller, clearing it.
    pub fn take_validation_output(&mut self) -> Option<String> {
        self.last_validation_output.take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    None,
    Wait,
    Advance,
    RetryValidation,
    Abort,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::None => "none",
            Action::Wait => "wait",
            Action::Advance => "advance",
            Action::RetryValidation => "retry-validation",
            Action::Abort => "abort",
        };
        f.write_str(name)
    }
}

/// Outcome of one engine tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub state: RolloutState,
    pub action: Action,
}

impl Decision {
    pub fn new(state: RolloutState, action: Action) -> Self {
        Self { state, action }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn state() -> RolloutState {
        RolloutState::new(
            "abc123",
            vec![Duration::from_secs(300), Duration::from_secs(600)],
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn new_state_starts_at_ring_zero() {
        let state = state();
        assert_eq!(state.current_ring, 0);
        assert_eq!(state.total_rings(), 2);
        assert_eq!(state.current_wait(), Some(Duration::from_secs(300)));
        assert!(!state.is_terminal());
    }

    #[test]
    fn terminal_when_completed_or_aborted() {
        let mut completed = state();
        completed.current_ring = 2;
        assert!(completed.is_completed());
        assert!(completed.is_terminal());
        assert_eq!(completed.current_wait(), None);

        let mut aborted = state();
        aborted.abort("aborted by operator");
        assert!(aborted.is_terminal());
        assert_eq!(aborted.abort_reason.as_deref(), Some("aborted by operator"));
    }

    #[test]
    fn empty_schedule_is_immediately_complete() {
        let state = RolloutState::new("abc123", Vec::new(), Utc::now());
        assert!(state.is_terminal());
    }

    #[test]
    fn persisted_form_uses_camel_case_and_millis() {
        let json = serde_json::to_value(state()).unwrap();
        assert_eq!(json["currentRing"], 0);
        assert_eq!(json["waitDurations"], serde_json::json!([300000, 600000]));
        assert_eq!(json["sourceVersion"], "abc123");
        assert!(json.get("abortReason").is_none());
    }

    #[test]
    fn validation_output_is_consumed_once() {
        let mut state = state();
        state.last_validation_output = Some("ok".to_string());
        assert_eq!(state.take_validation_output().as_deref(), Some("ok"));
        assert_eq!(state.take_validation_output(), None);
    }
}
