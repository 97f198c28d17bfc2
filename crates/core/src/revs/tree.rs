#![forbid(unsafe_code)]

use super::Revision;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevStatus {
    Available,
    Missing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevNode {
    pub hash: String,
    pub status: RevStatus,
    #[serde(default)]
    pub deleted: bool,
}

impl RevNode {
    pub fn available(hash: impl Into<String>, deleted: bool) -> Self {
        Self {
            hash: hash.into(),
            status: RevStatus::Available,
            deleted,
        }
    }

    /// A known ancestor whose body this store never held.
    pub fn missing(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            status: RevStatus::Missing,
            deleted: false,
        }
    }
}

/// A root-to-leaf chain; `nodes[i]` has generation `start + i`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevPath {
    pub start: u64,
    pub nodes: Vec<RevNode>,
}

impl RevPath {
    fn position_of(&self, rev: &Revision) -> Option<usize> {
        let offset = rev.generation().checked_sub(self.start)?;
        let index = usize::try_from(offset).ok()?;
        self.nodes
            .get(index)
            .filter(|node| node.hash == rev.hash())
            .map(|_| index)
    }

    fn revision_at(&self, index: usize) -> Option<Revision> {
        let node = self.nodes.get(index)?;
        Revision::try_new(self.start + index as u64, node.hash.clone()).ok()
    }

    fn leaf_index(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafInfo {
    pub rev: Revision,
    pub deleted: bool,
    pub status: RevStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeVisit {
    pub rev: Revision,
    pub status: RevStatus,
    pub deleted: bool,
    pub is_leaf: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extended {
    pub tree: RevTree,
    /// Revisions present before the extension that the new tree no longer holds.
    pub dropped: Vec<Revision>,
}

/// Revision history of one document, stored as a list of root-to-leaf paths.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevTree {
    paths: Vec<RevPath>,
}

impl RevTree {
    pub fn single(rev: &Revision, deleted: bool) -> Self {
        Self {
            paths: vec![RevPath {
                start: rev.generation(),
                nodes: vec![RevNode::available(rev.hash(), deleted)],
            }],
        }
    }

    pub fn from_paths(paths: Vec<RevPath>) -> Self {
        Self {
            paths: paths
                .into_iter()
                .filter(|path| !path.nodes.is_empty() && path.start > 0)
                .collect(),
        }
    }

    pub fn paths(&self) -> &[RevPath] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn interior(&self) -> BTreeSet<(u64, &str)> {
        let mut out = BTreeSet::new();
        for path in &self.paths {
            let Some(leaf) = path.leaf_index() else {
                continue;
            };
            for (index, node) in path.nodes.iter().enumerate().take(leaf) {
                out.insert((path.start + index as u64, node.hash.as_str()));
            }
        }
        out
    }

    pub fn leaves(&self) -> Vec<LeafInfo> {
        let interior = self.interior();
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for path in &self.paths {
            let Some(index) = path.leaf_index() else {
                continue;
            };
            let node = &path.nodes[index];
            let key = (path.start + index as u64, node.hash.as_str());
            if interior.contains(&key) || !seen.insert(key) {
                continue;
            }
            if let Some(rev) = path.revision_at(index) {
                out.push(LeafInfo {
                    rev,
                    deleted: node.deleted,
                    status: node.status,
                });
            }
        }
        out
    }

    /// Non-deleted leaves beat deleted ones, then the highest generation, then the hash.
    pub fn winning_rev(&self) -> Option<Revision> {
        self.leaves()
            .into_iter()
            .max_by(winning_order)
            .map(|leaf| leaf.rev)
    }

    pub fn winner_deleted(&self) -> bool {
        self.leaves()
            .into_iter()
            .max_by(winning_order)
            .is_some_and(|leaf| leaf.deleted)
    }

    pub fn collect_conflicts(&self) -> Vec<Revision> {
        let winner = self.winning_rev();
        let mut out = self
            .leaves()
            .into_iter()
            .filter(|leaf| !leaf.deleted && Some(&leaf.rev) != winner.as_ref())
            .map(|leaf| leaf.rev)
            .collect::<Vec<_>>();
        out.sort_by(|a, b| b.cmp(a));
        out
    }

    /// Visits every distinct node once, root first along each path.
    pub fn traverse(&self, mut visit: impl FnMut(&TreeVisit)) {
        let interior = self.interior();
        let mut seen = BTreeSet::new();
        for path in &self.paths {
            for (index, node) in path.nodes.iter().enumerate() {
                let generation = path.start + index as u64;
                if !seen.insert((generation, node.hash.as_str())) {
                    continue;
                }
                let Some(rev) = path.revision_at(index) else {
                    continue;
                };
                visit(&TreeVisit {
                    rev,
                    status: node.status,
                    deleted: node.deleted,
                    is_leaf: !interior.contains(&(generation, node.hash.as_str())),
                });
            }
        }
    }

    fn locate(&self, rev: &Revision) -> Option<(usize, usize)> {
        self.paths
            .iter()
            .enumerate()
            .find_map(|(path_index, path)| path.position_of(rev).map(|pos| (path_index, pos)))
    }

    fn node(&self, rev: &Revision) -> Option<&RevNode> {
        self.locate(rev)
            .map(|(path_index, pos)| &self.paths[path_index].nodes[pos])
    }

    pub fn contains(&self, rev: &Revision) -> bool {
        self.locate(rev).is_some()
    }

    pub fn status(&self, rev: &Revision) -> Option<RevStatus> {
        self.node(rev).map(|node| node.status)
    }

    pub fn is_deleted(&self, rev: &Revision) -> Option<bool> {
        self.node(rev).map(|node| node.deleted)
    }

    /// Resolves a possibly stale revision to the leaf of the branch holding it.
    pub fn latest(&self, rev: &Revision) -> Option<Revision> {
        let interior = self.interior();
        self.paths
            .iter()
            .filter(|path| path.position_of(rev).is_some())
            .filter_map(|path| {
                let index = path.leaf_index()?;
                let node = &path.nodes[index];
                if interior.contains(&(path.start + index as u64, node.hash.as_str())) {
                    return None;
                }
                Some(LeafInfo {
                    rev: path.revision_at(index)?,
                    deleted: node.deleted,
                    status: node.status,
                })
            })
            .max_by(winning_order)
            .map(|leaf| leaf.rev)
    }

    /// Hashes from `rev` back to the oldest retained ancestor.
    pub fn ancestry(&self, rev: &Revision) -> Option<Vec<String>> {
        let (path_index, pos) = self.locate(rev)?;
        let path = &self.paths[path_index];
        Some(
            path.nodes[..=pos]
                .iter()
                .rev()
                .map(|node| node.hash.clone())
                .collect(),
        )
    }

    /// Collapses the tree to the single branch running through `parent`, then
    /// appends `rev`. Keeps at most `revs_limit` generations.
    pub fn extend(
        &self,
        parent: Option<&Revision>,
        rev: &Revision,
        deleted: bool,
        revs_limit: usize,
    ) -> Extended {
        let located = parent
            .filter(|parent| parent.generation().checked_add(1) == Some(rev.generation()))
            .and_then(|parent| self.locate(parent));

        let (start, mut nodes) = match located {
            Some((path_index, pos)) => {
                let path = &self.paths[path_index];
                (path.start, path.nodes[..=pos].to_vec())
            }
            None => (rev.generation(), Vec::new()),
        };
        nodes.push(RevNode::available(rev.hash(), deleted));
        self.replace_with(start, nodes, revs_limit)
    }

    /// Appends a replicated chain (root first) that continues the winning leaf.
    ///
    /// Returns `None` when the chain does not pass through that leaf or adds
    /// nothing past it. An empty tree takes the chain as it is.
    pub fn graft(&self, chain: &RevPath, revs_limit: usize) -> Option<Extended> {
        if chain.nodes.is_empty() || chain.start == 0 {
            return None;
        }
        let Some(leaf) = self.winning_rev() else {
            return Some(self.replace_with(chain.start, chain.nodes.clone(), revs_limit));
        };

        let (path_index, pos) = self.locate(&leaf)?;
        let at = chain.position_of(&leaf)?;
        if at + 1 >= chain.nodes.len() {
            return None;
        }
        let path = &self.paths[path_index];
        let mut nodes = path.nodes[..=pos].to_vec();
        nodes.extend(chain.nodes[at + 1..].iter().cloned());
        Some(self.replace_with(path.start, nodes, revs_limit))
    }

    fn replace_with(&self, mut start: u64, mut nodes: Vec<RevNode>, revs_limit: usize) -> Extended {
        let limit = revs_limit.max(1);
        if nodes.len() > limit {
            let excess = nodes.len() - limit;
            nodes.drain(..excess);
            start += excess as u64;
        }

        let tree = RevTree {
            paths: vec![RevPath { start, nodes }],
        };
        let mut dropped = Vec::new();
        self.traverse(|visit| {
            if !tree.contains(&visit.rev) {
                dropped.push(visit.rev.clone());
            }
        });

        Extended { tree, dropped }
    }

    /// Returns how many distinct revisions flipped from available to missing.
    pub fn mark_missing(&mut self, revs: &[Revision]) -> usize {
        let mut flipped = BTreeSet::new();
        for path in &mut self.paths {
            for rev in revs {
                let Some(index) = path.position_of(rev) else {
                    continue;
                };
                let node = &mut path.nodes[index];
                if node.status == RevStatus::Available {
                    node.status = RevStatus::Missing;
                    flipped.insert(rev.clone());
                }
            }
        }
        flipped.len()
    }

    /// Available revisions that are no longer leaves; compaction candidates.
    pub fn obsolete_revs(&self) -> Vec<Revision> {
        let mut out = Vec::new();
        self.traverse(|visit| {
            if !visit.is_leaf && visit.status == RevStatus::Available {
                out.push(visit.rev.clone());
            }
        });
        out
    }
}

fn winning_order(a: &LeafInfo, b: &LeafInfo) -> Ordering {
    (!a.deleted, &a.rev).cmp(&(!b.deleted, &b.rev))
}
