// Ring Rollout Library - progressive promotion of artifacts through deployment rings
// This exposes the core components for testing and integration

pub mod config;
pub mod controller;
pub mod github;
pub mod publish;
pub mod rings;
pub mod rollout;
pub mod store;
pub mod telemetry;
pub mod validation;

// Re-export key types for easy access
pub use config::{DuplicateHandling, RingConfig, RolloutSettings, StoreKind};
pub use controller::{InstanceOutcome, RolloutController, TickReport};
pub use github::{GitHubClient, GitHubError};
pub use publish::{Git2Publisher, PublishReport, PushOutcome, RingPublisher, WriteBackTransaction};
pub use rings::{FsRingStore, PromoteResult, RingPropagation, RingPropagator, RingStore};
pub use rollout::{
    decide, parse_duration, Action, ControlFlags, Decision, RolloutError, RolloutState,
};
pub use store::{FileStateStore, IssueStateStore, RolloutRecord, StateStore, StoreError};
pub use telemetry::{create_rollout_span, generate_correlation_id, init_telemetry};
pub use validation::{ShellValidationGate, ValidationGate, ValidationResult};
