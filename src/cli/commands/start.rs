use anyhow::Result;
use chrono::Utc;

use super::{print_report, RolloutContext};

pub struct StartCommand {
    pub version: String,
}

impl StartCommand {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    pub async fn execute(&self, context: &RolloutContext) -> Result<()> {
        println!("🚀 Starting rollout of {}", self.version);

        let controller = context.controller()?;
        let report = controller.start(&self.version, Utc::now()).await?;
        print_report(&report);

        context.publish(&report).await
    }
}
