//! Migration chain
//!
//! Rebuilds the order of units from the `previous_version`/`next_version`
//! pointers stored in each `info.toml`. Nodes live in an arena owned by the
//! chain and refer to their neighbours by [`NodeId`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::MigrateResult;
use crate::unit::{scan_units, MigrationInfo, MigrationUnit};

/// Index of a node inside its [`Chain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A unit placed in the chain, with links to its neighbours
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainNode {
    pub unit: MigrationUnit,
    previous: Option<NodeId>,
    next: Option<NodeId>,
}

impl ChainNode {
    pub fn version(&self) -> &str {
        self.unit.version()
    }

    pub fn info(&self) -> &MigrationInfo {
        &self.unit.info
    }

    pub fn previous(&self) -> Option<NodeId> {
        self.previous
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }
}

/// Ordered, doubly linked sequence of migration units
#[derive(Debug, Clone, Default)]
pub struct Chain {
    migrations_dir: PathBuf,
    nodes: Vec<ChainNode>,
    index: HashMap<String, NodeId>,
    broken_link: Option<String>,
    orphans: Vec<String>,
    built: bool,
}

impl Chain {
    /// Unbuilt chain over `migrations_dir`
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            ..Self::default()
        }
    }

    /// Scan the migrations directory and link the units.
    ///
    /// Calling this again on a built chain does nothing. A dangling
    /// `next_version` does not fail the build: the chain stops at the last
    /// resolvable unit and the missing version is kept in [`Chain::broken_link`].
    pub fn build(&mut self) -> MigrateResult<&Self> {
        if self.built {
            return Ok(self);
        }

        let units = scan_units(&self.migrations_dir)?;
        self.link(units);
        Ok(self)
    }

    /// Build a chain from units that are already loaded
    pub fn from_units(migrations_dir: impl Into<PathBuf>, units: Vec<MigrationUnit>) -> Self {
        let mut chain = Self::new(migrations_dir);
        chain.link(units);
        chain
    }

    fn link(&mut self, units: Vec<MigrationUnit>) {
        self.built = true;
        let discovered = units.len();

        // Several heads is a data problem upstream; the first one found wins.
        let Some(head) = units.iter().position(|u| u.info.previous_version.is_none()) else {
            if units.is_empty() {
                tracing::warn!(dir = %self.migrations_dir.display(), "No migrations found");
            } else {
                self.orphans = units.into_iter().map(|u| u.info.version).collect();
                tracing::warn!(
                    dir = %self.migrations_dir.display(),
                    unreachable = ?self.orphans,
                    "No migration without previous_version found"
                );
            }
            return;
        };

        let mut pool: Vec<Option<MigrationUnit>> = units.into_iter().map(Some).collect();
        let mut current = pool[head].take();

        while let Some(unit) = current.take() {
            let next_version = unit.info.next_version.clone();
            let id = self.push(unit);

            let Some(next_version) = next_version else {
                break;
            };

            if self.index.contains_key(&next_version) {
                tracing::error!(
                    version = %self.nodes[id.0].version(),
                    next_version = %next_version,
                    "Migration chain broken: next_version {} loops back into the chain",
                    next_version
                );
                self.broken_link = Some(next_version);
                break;
            }

            let position = pool
                .iter()
                .position(|u| u.as_ref().is_some_and(|u| u.version() == next_version));
            let found = position.and_then(|pos| pool[pos].take());

            match found {
                Some(next) => {
                    if next.info.previous_version.as_deref() != Some(self.nodes[id.0].version()) {
                        tracing::warn!(
                            version = %next.version(),
                            previous_version = ?next.info.previous_version,
                            expected = %self.nodes[id.0].version(),
                            "previous_version does not point back to the linking unit"
                        );
                    }
                    current = Some(next);
                }
                None => {
                    tracing::error!(
                        expected = %next_version,
                        "Migration chain broken: next_version {} not found",
                        next_version
                    );
                    self.broken_link = Some(next_version);
                }
            }
        }

        self.orphans = pool.into_iter().flatten().map(|u| u.info.version).collect();
        if self.nodes.len() < discovered {
            tracing::error!(
                linked = self.nodes.len(),
                discovered,
                unreachable = ?self.orphans,
                "Some migrations are not reachable from the chain head"
            );
        }

        tracing::debug!(
            count = self.nodes.len(),
            head = ?self.head().map(|n| n.version()),
            tail = ?self.tail().map(|n| n.version()),
            "migration chain built"
        );
    }

    fn push(&mut self, unit: MigrationUnit) -> NodeId {
        let id = NodeId(self.nodes.len());
        let previous = self.nodes.len().checked_sub(1).map(NodeId);
        if let Some(prev) = previous {
            self.nodes[prev.0].next = Some(id);
        }

        self.index.insert(unit.info.version.clone(), id);
        self.nodes.push(ChainNode {
            unit,
            previous,
            next: None,
        });
        id
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn head_id(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    pub fn tail_id(&self) -> Option<NodeId> {
        self.nodes.len().checked_sub(1).map(NodeId)
    }

    pub fn head(&self) -> Option<&ChainNode> {
        self.nodes.first()
    }

    pub fn tail(&self) -> Option<&ChainNode> {
        self.nodes.last()
    }

    /// Node behind `id`. Ids only come from this chain, so lookup cannot miss.
    pub fn node(&self, id: NodeId) -> &ChainNode {
        &self.nodes[id.0]
    }

    pub fn find_by_version(&self, version: &str) -> Option<NodeId> {
        self.index.get(version).copied()
    }

    /// Nodes from head to tail
    pub fn iter(&self) -> impl Iterator<Item = &ChainNode> {
        self.nodes.iter()
    }

    pub fn versions(&self) -> Vec<&str> {
        self.iter().map(|n| n.version()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Version a `next_version` pointed at that could not be resolved
    pub fn broken_link(&self) -> Option<&str> {
        self.broken_link.as_deref()
    }

    /// Valid units left out of the chain
    pub fn orphans(&self) -> &[String] {
        &self.orphans
    }
}
