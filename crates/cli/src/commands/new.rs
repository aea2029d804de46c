use std::path::Path;

use hermes_migrate::{create_migration, Chain, MigrationUnit};

use crate::context::CommandContext;

pub fn run(config_path: &str, message: &str) -> anyhow::Result<()> {
    let ctx = CommandContext::load(config_path)?;
    let unit = create(&ctx.migrations_dir, message)?;
    println!("Created migration {}", unit.dir.display());
    Ok(())
}

/// Scaffold a unit after the current head of `migrations_dir`
pub fn create(migrations_dir: &Path, message: &str) -> anyhow::Result<MigrationUnit> {
    let mut chain = Chain::new(migrations_dir);
    let chain = chain.build()?;
    Ok(create_migration(chain, message)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_chains_units() {
        let temp_dir = TempDir::new().unwrap();

        let first = create(temp_dir.path(), "create events").unwrap();
        let second = create(temp_dir.path(), "add source column").unwrap();

        assert_eq!(
            second.info.previous_version.as_deref(),
            Some(first.version())
        );
        let name = second.dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("--add_source_column"));

        let mut chain = Chain::new(temp_dir.path());
        let versions: Vec<String> = chain
            .build()
            .unwrap()
            .versions()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(versions, vec![first.info.version, second.info.version]);
    }
}
