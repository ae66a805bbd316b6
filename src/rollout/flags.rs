use serde::{Deserialize, Serialize};

pub const ABORT_TAG: &str = "abort";
pub const PAUSED_TAG: &str = "paused";
pub const FASTLANE_TAG: &str = "fastlane";
pub const IGNORE_VALIDATION_TAG: &str = "ignore-validation";

/// Operator intents for a single tick.
///
/// Derived fresh from the tags attached to a rollout instance every time and
/// never persisted. The flags are independent; the engine decides which one
/// wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlags {
    pub fastlane: bool,
    pub paused: bool,
    pub aborted: bool,
    pub ignore_validation: bool,
}

impl ControlFlags {
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags = ControlFlags::default();
        for tag in tags {
            match tag.as_ref() {
                ABORT_TAG => flags.aborted = true,
                PAUSED_TAG => flags.paused = true,
                FASTLANE_TAG => flags.fastlane = true,
                IGNORE_VALIDATION_TAG => flags.ignore_validation = true,
                _ => {}
            }
        }
        flags
    }
}
