// Property-based tests for decision precedence
// The engine must honour flag precedence for any state, clock and flag mix

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use proptest::prelude::*;
use ring_rollout::{
    decide, Action, ControlFlags, PromoteResult, RingConfig, RingPropagation, RolloutError,
    RolloutState, ValidationGate, ValidationResult,
};
use std::cell::Cell;
use std::time::Duration;

struct CountingGate {
    pass: bool,
    calls: Cell<u32>,
}

impl ValidationGate for CountingGate {
    fn run(&self, _command: &str) -> Result<ValidationResult, RolloutError> {
        self.calls.set(self.calls.get() + 1);
        Ok(ValidationResult {
            success: self.pass,
            output: String::new(),
        })
    }
}

struct CountingPropagation {
    marker_matches: bool,
    calls: Cell<u32>,
}

impl RingPropagation for CountingPropagation {
    fn promote(&self, ring_index: usize, expected: &str) -> Result<PromoteResult, RolloutError> {
        self.calls.set(self.calls.get() + 1);
        if self.marker_matches {
            Ok(PromoteResult::Promoted {
                to_ring: ring_index + 1,
            })
        } else {
            Ok(PromoteResult::VersionMismatch {
                ring: ring_index,
                expected: expected.to_string(),
                found: Some("other".to_string()),
            })
        }
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

#[derive(Debug, Clone)]
struct Case {
    waits_secs: Vec<u64>,
    current_ring: usize,
    aborted: bool,
    retries: u32,
    max_retries: u32,
    validation: bool,
    elapsed_secs: i64,
    flags: ControlFlags,
    gate_passes: bool,
    marker_matches: bool,
}

fn flags_strategy() -> impl Strategy<Value = ControlFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(fastlane, paused, aborted, ignore_validation)| ControlFlags {
            fastlane,
            paused,
            aborted,
            ignore_validation,
        },
    )
}

fn case_strategy() -> impl Strategy<Value = Case> {
    (
        prop::collection::vec(0u64..7200, 1..5),
        0usize..6,
        any::<bool>(),
        0u32..4,
        0u32..4,
        any::<bool>(),
        -600i64..10_000,
        flags_strategy(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(
                waits_secs,
                ring,
                aborted,
                retries,
                max_retries,
                validation,
                elapsed_secs,
                flags,
                gate_passes,
                marker_matches,
            )| {
                let current_ring = ring.min(waits_secs.len());
                Case {
                    waits_secs,
                    current_ring,
                    aborted,
                    retries: retries.min(max_retries),
                    max_retries,
                    validation,
                    elapsed_secs,
                    flags,
                    gate_passes,
                    marker_matches,
                }
            },
        )
}

struct Run {
    state: RolloutState,
    action: Action,
    validations: u32,
    promotions: u32,
}

fn build(case: &Case) -> (RolloutState, RingConfig) {
    let mut state = RolloutState::new(
        "abc123",
        case.waits_secs.iter().map(|s| Duration::from_secs(*s)).collect(),
        t0(),
    );
    state.current_ring = case.current_ring;
    state.aborted = case.aborted;
    state.validation_retry_count = case.retries;

    let waits: Vec<String> = case.waits_secs.iter().map(|s| format!("{s}s")).collect();
    let wait_refs: Vec<&str> = waits.iter().map(String::as_str).collect();
    let mut config = RingConfig::new("flags", "*.json", "rings", &wait_refs);
    if case.validation {
        config = config.with_validation("./check.sh", case.max_retries);
    }
    (state, config)
}

fn run(case: &Case) -> (RolloutState, Run) {
    let (state, config) = build(case);
    let gate = CountingGate {
        pass: case.gate_passes,
        calls: Cell::new(0),
    };
    let propagation = CountingPropagation {
        marker_matches: case.marker_matches,
        calls: Cell::new(0),
    };
    let now = t0() + ChronoDuration::seconds(case.elapsed_secs);

    let decision = decide(&state, &config, case.flags, now, &gate, &propagation).unwrap();
    (
        state,
        Run {
            state: decision.state,
            action: decision.action,
            validations: gate.calls.get(),
            promotions: propagation.calls.get(),
        },
    )
}

fn wait_elapsed(case: &Case) -> bool {
    match case.waits_secs.get(case.current_ring) {
        Some(wait) => case.elapsed_secs.max(0) as u64 >= *wait,
        None => true,
    }
}

proptest! {
    #[test]
    fn terminal_states_are_fixed_points(case in case_strategy()) {
        let (before, after) = run(&case);
        if before.is_terminal() {
            prop_assert_eq!(after.action, Action::None);
            prop_assert_eq!(after.state, before);
            prop_assert_eq!(after.validations + after.promotions, 0);
        }
    }

    #[test]
    fn abort_flag_dominates_everything(case in case_strategy()) {
        let (before, after) = run(&case);
        if !before.is_terminal() && case.flags.aborted {
            prop_assert_eq!(after.action, Action::Abort);
            prop_assert!(after.state.aborted);
            prop_assert_eq!(after.state.current_ring, before.current_ring);
            prop_assert_eq!(after.validations + after.promotions, 0);
        }
    }

    #[test]
    fn pause_leaves_state_untouched(case in case_strategy()) {
        let (before, after) = run(&case);
        if !before.is_terminal() && !case.flags.aborted && case.flags.paused {
            prop_assert_eq!(after.action, Action::None);
            prop_assert_eq!(after.state, before);
            prop_assert_eq!(after.validations + after.promotions, 0);
        }
    }

    #[test]
    fn fastlane_never_skips_validation(case in case_strategy()) {
        let (before, after) = run(&case);
        let runs_validation = case.validation && !case.flags.ignore_validation;
        if !before.is_terminal() && !case.flags.aborted && !case.flags.paused
            && case.flags.fastlane && runs_validation
        {
            prop_assert_eq!(after.validations, 1);
            prop_assert_ne!(after.action, Action::Wait);
        }
    }

    #[test]
    fn ignore_validation_never_skips_the_wait(case in case_strategy()) {
        let (before, after) = run(&case);
        if !before.is_terminal() && !case.flags.aborted && !case.flags.paused
            && !case.flags.fastlane && case.flags.ignore_validation && !wait_elapsed(&case)
        {
            prop_assert_eq!(after.action, Action::Wait);
            prop_assert_eq!(after.state, before);
            prop_assert_eq!(after.validations, 0);
        }
    }

    #[test]
    fn retry_count_climbs_by_one_until_abort(case in case_strategy()) {
        let (before, after) = run(&case);
        if after.validations == 1 && !case.gate_passes {
            if before.validation_retry_count < case.max_retries {
                prop_assert_eq!(after.action, Action::RetryValidation);
                prop_assert_eq!(
                    after.state.validation_retry_count,
                    before.validation_retry_count + 1
                );
            } else {
                prop_assert_eq!(after.action, Action::Abort);
                prop_assert_eq!(after.state.abort_reason.as_deref(), Some("validation failed"));
            }
            prop_assert_eq!(after.promotions, 0);
            prop_assert_eq!(after.state.current_ring, before.current_ring);
        }
    }

    #[test]
    fn ring_only_advances_on_matching_marker(case in case_strategy()) {
        let (before, after) = run(&case);
        if after.state.current_ring != before.current_ring {
            prop_assert!(case.marker_matches);
            prop_assert_eq!(after.promotions, 1);
            prop_assert_eq!(after.state.current_ring, before.current_ring + 1);
            prop_assert_eq!(after.action, Action::Advance);
        }
        if after.promotions == 1 && !case.marker_matches {
            prop_assert_eq!(after.action, Action::Abort);
            prop_assert_eq!(after.state.current_ring, before.current_ring);
        }
    }
}
