use anyhow::Context as _;
use hermes_migrate::Target;

use super::upgrade::print_report;
use crate::context::CommandContext;

pub async fn run(config_path: &str, revision: &str) -> anyhow::Result<()> {
    let ctx = CommandContext::load(config_path)?;
    let target: Target = revision.parse()?;

    let mut conn = ctx.connect().await?;
    let report = ctx
        .migrator()
        .downgrade(&mut conn, &target)
        .await
        .with_context(|| format!("Downgrade to {} failed", target))?;

    print_report(&report);
    Ok(())
}
