//! Rollout controller
//!
//! Drives every configured ring set for one invocation: starting new
//! rollouts when a revision lands and ticking the active ones on a schedule.
//! Instances are processed one at a time; any fatal error stops the
//! invocation before later instances are touched.

use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::path::PathBuf;
use tracing::{info, warn, Instrument};

use crate::config::{DuplicateHandling, RingConfig};
use crate::rings::{FsRingStore, RingPropagator};
use crate::rollout::{decide, Action, ControlFlags, RolloutError, RolloutState};
use crate::store::{RolloutRecord, StateStore};
use crate::telemetry::{create_rollout_span, generate_correlation_id};
use crate::validation::ValidationGate;

/// What happened to one rollout instance during an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOutcome {
    pub rollout: String,
    pub id: String,
    pub version: String,
    pub ring: usize,
    pub total_rings: usize,
    pub action: Action,
    pub abort_reason: Option<String>,
    pub retired: bool,
}

impl InstanceOutcome {
    fn new(record: &RolloutRecord, action: Action, retired: bool) -> Self {
        Self {
            rollout: record.name.clone(),
            id: record.id.clone(),
            version: record.state.source_version.clone(),
            ring: record.state.current_ring,
            total_rings: record.state.total_rings(),
            action,
            abort_reason: record.state.abort_reason.clone(),
            retired,
        }
    }
}

/// Result of one `start` or `tick`.
///
/// State is already persisted by the time the report is returned. If the
/// caller then fails to publish the changed ring directories, the next run
/// finds the promoted ring without a marker and aborts that rollout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub outcomes: Vec<InstanceOutcome>,
    /// Ring directories were written and need publishing
    pub directories_changed: bool,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Commit message describing the ring directory changes.
    pub fn commit_message(&self) -> String {
        let mut message = String::from("ring-rollout: update ring directories\n");
        for outcome in self.outcomes.iter().filter(|o| o.action == Action::Advance) {
            let _ = write!(
                message,
                "\n- {} @ {}: ring {} of {}",
                outcome.rollout, outcome.version, outcome.ring, outcome.total_rings
            );
        }
        message
    }
}

pub struct RolloutController<S> {
    rings: Vec<RingConfig>,
    store: S,
    validator: Box<dyn ValidationGate + Send + Sync>,
    correlation_id: String,
}

impl<S: StateStore> RolloutController<S> {
    pub fn new(
        rings: Vec<RingConfig>,
        store: S,
        validator: Box<dyn ValidationGate + Send + Sync>,
    ) -> Self {
        Self {
            rings,
            store,
            validator,
            correlation_id: generate_correlation_id(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Begin rolling out `version` for every configured ring set.
    pub async fn start(
        &self,
        version: &str,
        now: DateTime<Utc>,
    ) -> Result<TickReport, RolloutError> {
        // Reject bad patterns and schedules before touching anything.
        let schedules = self
            .rings
            .iter()
            .map(RingConfig::check)
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = TickReport::default();
        for (ring, schedule) in self.rings.iter().zip(schedules) {
            let span = create_rollout_span("start", &ring.name, None, &self.correlation_id);
            self.start_one(ring, version, schedule, now, &mut report)
                .instrument(span)
                .await?;
        }
        Ok(report)
    }

    /// Directories that must never be swept into a ring 0 snapshot: every
    /// ring set's target root and whatever the state store writes locally.
    fn snapshot_exclusions(&self) -> Vec<PathBuf> {
        self.rings
            .iter()
            .map(|ring| ring.target_root.clone())
            .chain(self.store.local_paths())
            .collect()
    }

    async fn start_one(
        &self,
        ring: &RingConfig,
        version: &str,
        schedule: Vec<std::time::Duration>,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), RolloutError> {
        let active = self.store.load_active(&ring.name).await?;
        if active.iter().any(|r| r.state.source_version == version) {
            info!(rollout = %ring.name, version, "version is already rolling out");
            return Ok(());
        }

        // Snapshot first: a failure here leaves in-flight rollouts untouched.
        let propagator = RingPropagator::new(FsRingStore::new(&ring.target_root));
        let files = propagator.materialize_initial(
            &ring.source_root,
            &ring.pattern,
            &self.snapshot_exclusions(),
            version,
        )?;
        report.directories_changed = true;

        match ring.duplicate_handling {
            DuplicateHandling::Abort => {
                for mut record in active {
                    record.state.abort(format!("superseded by {version}"));
                    self.store.save(&record).await?;
                    self.store
                        .notify(&record, &abort_message(&record.state, None))
                        .await?;
                    self.store.retire(&record).await?;
                    warn!(rollout = %ring.name, id = %record.id, "superseded in-flight rollout");
                    report
                        .outcomes
                        .push(InstanceOutcome::new(&record, Action::Abort, true));
                }
            }
            DuplicateHandling::Allow if !active.is_empty() => {
                info!(
                    rollout = %ring.name,
                    in_flight = active.len(),
                    "starting alongside in-flight rollouts"
                );
            }
            DuplicateHandling::Allow => {}
        }

        let state = RolloutState::new(version, schedule, now);
        let record = self.store.create(&ring.name, state).await?;
        self.store
            .notify(
                &record,
                &format!(
                    "🚀 Rollout of `{version}` started: ring 0 holds {files} file(s), {} ring(s) to go.",
                    record.state.total_rings()
                ),
            )
            .await?;

        info!(rollout = %ring.name, id = %record.id, version, "rollout started");
        report
            .outcomes
            .push(InstanceOutcome::new(&record, Action::Advance, false));
        Ok(())
    }

    /// Evaluate every active instance of every ring set once.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, RolloutError> {
        let mut report = TickReport::default();
        for ring in &self.rings {
            let records = self.store.load_active(&ring.name).await?;
            if records.is_empty() {
                continue;
            }
            let propagator = RingPropagator::new(FsRingStore::new(&ring.target_root));

            for record in records {
                let span = create_rollout_span(
                    "tick",
                    &ring.name,
                    Some(&record.id),
                    &self.correlation_id,
                );
                let outcome = self
                    .tick_one(ring, &propagator, record, now)
                    .instrument(span)
                    .await?;
                if outcome.action == Action::Advance {
                    report.directories_changed = true;
                }
                report.outcomes.push(outcome);
            }
        }
        Ok(report)
    }

    async fn tick_one(
        &self,
        ring: &RingConfig,
        propagator: &RingPropagator<FsRingStore>,
        mut record: RolloutRecord,
        now: DateTime<Utc>,
    ) -> Result<InstanceOutcome, RolloutError> {
        let flags = ControlFlags::from_tags(&record.tags);
        let decision = decide(
            &record.state,
            ring,
            flags,
            now,
            self.validator.as_ref(),
            propagator,
        )?;

        let mut state = decision.state;
        let output = state.take_validation_output();
        let changed = state != record.state;
        record.state = state;

        if changed {
            self.store.save(&record).await?;
        }

        let message = match decision.action {
            Action::Advance if record.state.is_completed() => Some(format!(
                "✅ Rollout of `{}` complete: all {} ring(s) promoted.",
                record.state.source_version,
                record.state.total_rings()
            )),
            Action::Advance => Some(format!(
                "⏩ Promoted `{}` to ring {} of {}.",
                record.state.source_version,
                record.state.current_ring,
                record.state.total_rings()
            )),
            Action::RetryValidation => Some(retry_message(&record.state, ring, output.as_deref())),
            Action::Abort => Some(abort_message(&record.state, output.as_deref())),
            Action::None | Action::Wait => None,
        };
        if let Some(message) = message {
            self.store.notify(&record, &message).await?;
        }

        let retired = record.state.is_terminal();
        if retired {
            self.store.retire(&record).await?;
        }

        info!(
            action = %decision.action,
            ring = record.state.current_ring,
            version = %record.state.source_version,
            retired,
            "rollout evaluated"
        );
        Ok(InstanceOutcome::new(&record, decision.action, retired))
    }

    /// Active instances of every configured ring set.
    pub async fn status(&self) -> Result<Vec<RolloutRecord>, RolloutError> {
        let mut records = Vec::new();
        for ring in &self.rings {
            records.extend(self.store.load_active(&ring.name).await?);
        }
        Ok(records)
    }
}

fn fenced(output: &str) -> String {
    format!("\n\n```\n{}\n```", output.trim_end())
}

fn retry_message(state: &RolloutState, ring: &RingConfig, output: Option<&str>) -> String {
    let mut message = format!(
        "⚠️ Validation failed for ring {} (attempt {} of {}), retrying on the next tick.",
        state.current_ring, state.validation_retry_count, ring.validation_max_retries
    );
    if let Some(output) = output.filter(|o| !o.trim().is_empty()) {
        message.push_str(&fenced(output));
    }
    message
}

fn abort_message(state: &RolloutState, output: Option<&str>) -> String {
    let mut message = format!(
        "🛑 Rollout of `{}` aborted at ring {}: {}",
        state.source_version,
        state.current_ring,
        state.abort_reason.as_deref().unwrap_or("unknown reason")
    );
    if let Some(output) = output.filter(|o| !o.trim().is_empty()) {
        message.push_str(&fenced(output));
    }
    message
}
