use anyhow::Context as _;
use hermes_migrate::{ExecutionReport, Target};

use crate::context::CommandContext;

pub async fn run(config_path: &str, revision: &str) -> anyhow::Result<()> {
    let ctx = CommandContext::load(config_path)?;
    let target: Target = revision.parse()?;

    let mut conn = ctx.connect().await?;
    let report = ctx
        .migrator()
        .upgrade(&mut conn, &target)
        .await
        .with_context(|| format!("Upgrade to {} failed", target))?;

    print_report(&report);
    Ok(())
}

pub fn print_report(report: &ExecutionReport) {
    if report.applied.is_empty() {
        println!("Nothing to {}", report.direction);
        return;
    }

    for version in &report.applied {
        println!("  {} {}", report.direction, version);
    }
    println!(
        "{} migration(s) in {} ms, now at {}",
        report.applied_count(),
        report.elapsed_ms,
        report.marker.as_deref().unwrap_or("base")
    );
}
