use anyhow::Result;
use chrono::Utc;

use super::{print_report, RolloutContext};

pub struct TickCommand;

impl TickCommand {
    pub async fn execute(&self, context: &RolloutContext) -> Result<()> {
        let controller = context.controller()?;
        let report = controller.tick(Utc::now()).await?;
        print_report(&report);

        context.publish(&report).await
    }
}
