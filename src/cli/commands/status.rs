use anyhow::Result;
use chrono::Utc;
use ring_rollout::{ControlFlags, RolloutRecord};

use super::RolloutContext;

pub struct StatusCommand;

impl StatusCommand {
    pub async fn execute(&self, context: &RolloutContext) -> Result<()> {
        println!("🎯 RING ROLLOUT STATUS");
        println!("=====================");
        println!();

        let controller = context.controller()?;
        let records = controller.status().await?;
        if records.is_empty() {
            println!("💤 No active rollouts");
            return Ok(());
        }

        for record in &records {
            println!("{}", describe(record));
        }
        Ok(())
    }
}

fn describe(record: &RolloutRecord) -> String {
    let state = &record.state;
    let mut line = format!(
        "📦 {} [{}] {}: ring {} of {}",
        record.name,
        record.id,
        state.source_version,
        state.current_ring,
        state.total_rings()
    );

    let flags = ControlFlags::from_tags(&record.tags);
    if flags.aborted {
        line.push_str(" 🛑 abort requested");
    } else if flags.paused {
        line.push_str(" ⏸️  paused");
    }
    if flags.fastlane {
        line.push_str(" 🏎️  fastlane");
    }
    if flags.ignore_validation {
        line.push_str(" 🙈 ignoring validation");
    }
    if state.validation_retry_count > 0 {
        line.push_str(&format!(" (validation retries: {})", state.validation_retry_count));
    }
    if let Some(wait) = state.current_wait() {
        let since = Utc::now() - state.last_rollout_timestamp;
        let waited = since.to_std().unwrap_or_default();
        if waited < wait {
            let remaining = (wait - waited).as_secs();
            line.push_str(&format!(" ⏳ {}m{}s until eligible", remaining / 60, remaining % 60));
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring_rollout::RolloutState;
    use std::collections::BTreeSet;
    use std::time::Duration;

    #[test]
    fn describes_progress_and_flags() {
        let mut state = RolloutState::new("abc123", vec![Duration::ZERO; 3], Utc::now());
        state.current_ring = 1;
        let record = RolloutRecord {
            id: "42".to_string(),
            name: "flags".to_string(),
            state,
            tags: BTreeSet::from(["paused".to_string(), "fastlane".to_string()]),
        };

        let line = describe(&record);
        assert!(line.contains("flags [42] abc123: ring 1 of 3"));
        assert!(line.contains("paused"));
        assert!(line.contains("fastlane"));
        assert!(!line.contains("until eligible"));
    }
}
