mod commands;
mod context;

use std::path::Path;

use clap::{Parser, Subcommand};
use commands::*;
use hermes_core::DEFAULT_CONFIG_FILE;

#[derive(Parser, Debug)]
#[command(name = "hermes")]
#[command(version, about = "Schema migrations for ClickHouse")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Create hermes.toml in the current directory
    Init {
        /// Folder holding migration units (defaults to "versions")
        folder_name: Option<String>,
    },

    /// Create a new migration after the current head
    New {
        /// Migration description, also used in the directory name
        #[arg(long, short)]
        message: String,

        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config_path: String,
    },

    /// Apply migrations up to a revision
    Upgrade {
        /// "head" or a migration version
        revision: String,

        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config_path: String,
    },

    /// Revert migrations down to a revision
    Downgrade {
        /// "base" or a migration version
        revision: String,

        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config_path: String,
    },

    /// Show the applied version and pending migrations
    Status {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { folder_name } => {
            init::run(Path::new(DEFAULT_CONFIG_FILE), folder_name.as_deref())?;
        }
        Commands::New {
            message,
            config_path,
        } => {
            new::run(&config_path, &message)?;
        }
        Commands::Upgrade {
            revision,
            config_path,
        } => {
            upgrade::run(&config_path, &revision).await?;
        }
        Commands::Downgrade {
            revision,
            config_path,
        } => {
            downgrade::run(&config_path, &revision).await?;
        }
        Commands::Status { config_path } => {
            status::run(&config_path).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_parse_init() {
        assert_eq!(parse(&["hermes", "init"]), Commands::Init { folder_name: None });
        assert_eq!(
            parse(&["hermes", "init", "migrations"]),
            Commands::Init {
                folder_name: Some("migrations".to_string())
            }
        );
    }

    #[test]
    fn test_parse_new_requires_message() {
        assert!(Cli::try_parse_from(["hermes", "new"]).is_err());
        assert_eq!(
            parse(&["hermes", "new", "-m", "create users"]),
            Commands::New {
                message: "create users".to_string(),
                config_path: "hermes.toml".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_revisions() {
        assert_eq!(
            parse(&["hermes", "upgrade", "head", "--config-path", "conf/hermes.toml"]),
            Commands::Upgrade {
                revision: "head".to_string(),
                config_path: "conf/hermes.toml".to_string(),
            }
        );
        assert_eq!(
            parse(&["hermes", "downgrade", "base"]),
            Commands::Downgrade {
                revision: "base".to_string(),
                config_path: "hermes.toml".to_string(),
            }
        );
        assert!(Cli::try_parse_from(["hermes", "upgrade"]).is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(
            parse(&["hermes", "status"]),
            Commands::Status {
                config_path: "hermes.toml".to_string()
            }
        );
    }
}
