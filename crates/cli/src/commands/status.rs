use hermes_migrate::{MigrationStatus, UnitState};

use crate::context::CommandContext;

pub async fn run(config_path: &str) -> anyhow::Result<()> {
    let ctx = CommandContext::load(config_path)?;
    let mut conn = ctx.connect().await?;
    let status = ctx.migrator().status(&mut conn).await?;

    print!("{}", render(&status));
    Ok(())
}

/// Human-readable status listing, head first
pub fn render(status: &MigrationStatus) -> String {
    let mut out = format!(
        "Current version: {}\n",
        status.current.as_deref().unwrap_or("base")
    );
    if !status.current_in_chain() {
        out.push_str("  (not found in the migration chain)\n");
    }

    if status.entries.is_empty() {
        out.push_str("No migrations found\n");
    }
    for entry in &status.entries {
        let mark = match entry.state {
            UnitState::Current => "*",
            UnitState::Applied => "+",
            UnitState::Pending => " ",
        };
        out.push_str(&format!(
            "{} {} {:<8} {}\n",
            mark, entry.version, entry.state, entry.message
        ));
    }

    if let Some(missing) = &status.broken_link {
        out.push_str(&format!(
            "Migration chain broken: next_version {} not found\n",
            missing
        ));
    }
    if !status.orphans.is_empty() {
        out.push_str(&format!("Unreachable: {}\n", status.orphans.join(", ")));
    }
    out
}
