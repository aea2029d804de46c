//! Migration planning
//!
//! Turns the current marker and a requested [`Target`] into the ordered list
//! of chain nodes the executor has to run. Planning never touches the
//! database; every structural problem is reported before anything executes.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::chain::{Chain, NodeId};
use crate::error::{MigrateResult, MigrationError};
use crate::unit::Direction;

/// Where a run should leave the database
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Last unit of the chain
    Head,
    /// No unit applied
    Base,
    Version(String),
}

impl FromStr for Target {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "head" => Target::Head,
            "base" => Target::Base,
            version => Target::Version(version.to_string()),
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Head => f.write_str("head"),
            Target::Base => f.write_str("base"),
            Target::Version(version) => f.write_str(version),
        }
    }
}

/// Ordered nodes to run in one direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub direction: Direction,
    pub nodes: Vec<NodeId>,
}

impl Plan {
    fn empty(direction: Direction) -> Self {
        Self {
            direction,
            nodes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Versions in execution order
    pub fn versions<'a>(&self, chain: &'a Chain) -> Vec<&'a str> {
        self.nodes.iter().map(|id| chain.node(*id).version()).collect()
    }
}

/// Reject targets that cannot be planned whatever the current marker is.
///
/// Lets callers fail before the database is contacted.
pub fn check_target(chain: &Chain, target: &Target, direction: Direction) -> MigrateResult<()> {
    match (target, direction) {
        (Target::Base, Direction::Upgrade) | (Target::Head, Direction::Downgrade) => {
            Err(MigrationError::InvalidTarget {
                direction,
                target: target.to_string(),
            })
        }
        (Target::Version(version), _) if chain.find_by_version(version).is_none() => {
            Err(MigrationError::TargetNotFound(version.clone()))
        }
        _ => Ok(()),
    }
}

/// Plan a run in `direction`
pub fn plan(
    chain: &Chain,
    current: Option<&str>,
    target: &Target,
    direction: Direction,
) -> MigrateResult<Plan> {
    match direction {
        Direction::Upgrade => plan_upgrade(chain, current, target),
        Direction::Downgrade => plan_downgrade(chain, current, target),
    }
}

/// Plan an upgrade.
///
/// `head` runs every unit after the current one. An explicit version runs
/// that single unit only, without the units in between.
pub fn plan_upgrade(chain: &Chain, current: Option<&str>, target: &Target) -> MigrateResult<Plan> {
    let direction = Direction::Upgrade;

    match target {
        Target::Base => Err(MigrationError::InvalidTarget {
            direction,
            target: target.to_string(),
        }),
        Target::Head => {
            let Some(tail) = chain.tail() else {
                tracing::info!("No migrations in chain");
                return Ok(Plan::empty(direction));
            };
            if current == Some(tail.version()) {
                tracing::info!(version = %tail.version(), "Already at head");
                return Ok(Plan::empty(direction));
            }

            let start = match current {
                None => chain.head_id(),
                Some(version) => {
                    let id = chain
                        .find_by_version(version)
                        .ok_or_else(|| MigrationError::CurrentNotFound(version.to_string()))?;
                    chain.node(id).next()
                }
            };

            let mut nodes = Vec::new();
            let mut cursor = start;
            while let Some(id) = cursor {
                nodes.push(id);
                cursor = chain.node(id).next();
            }
            Ok(Plan { direction, nodes })
        }
        Target::Version(version) => {
            let id = chain
                .find_by_version(version)
                .ok_or_else(|| MigrationError::TargetNotFound(version.clone()))?;

            if current == Some(version.as_str()) {
                tracing::info!(version = %version, "Already at version {}", version);
                return Ok(Plan::empty(direction));
            }
            Ok(Plan {
                direction,
                nodes: vec![id],
            })
        }
    }
}

/// Plan a downgrade.
///
/// Walks `previous` links from the current unit. `base` reverts down to and
/// including the head; an explicit version stops before that version, which
/// becomes the new current state.
pub fn plan_downgrade(chain: &Chain, current: Option<&str>, target: &Target) -> MigrateResult<Plan> {
    let direction = Direction::Downgrade;

    if *target == Target::Head {
        return Err(MigrationError::InvalidTarget {
            direction,
            target: target.to_string(),
        });
    }

    let Some(current) = current else {
        tracing::info!("Already at base (no migrations applied)");
        return Ok(Plan::empty(direction));
    };

    let current_id = chain
        .find_by_version(current)
        .ok_or_else(|| MigrationError::CurrentNotFound(current.to_string()))?;

    let stop = match target {
        Target::Version(version) => {
            if chain.find_by_version(version).is_none() {
                return Err(MigrationError::TargetNotFound(version.clone()));
            }
            if version == current {
                tracing::info!(version = %version, "Already at version {}", version);
                return Ok(Plan::empty(direction));
            }
            Some(version.as_str())
        }
        _ => None,
    };

    let mut nodes = Vec::new();
    let mut cursor = Some(current_id);
    while let Some(id) = cursor {
        let node = chain.node(id);
        if Some(node.version()) == stop {
            return Ok(Plan { direction, nodes });
        }
        nodes.push(id);
        cursor = node.previous();
    }

    match stop {
        // Target sits ahead of the current unit
        Some(version) => Err(MigrationError::Unreachable {
            target: version.to_string(),
            current: current.to_string(),
        }),
        None => Ok(Plan { direction, nodes }),
    }
}
