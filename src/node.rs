//! Node storage for the hash tree.
//!
//! Every node owns one entry and its children. Child storage is adaptive:
//! a node keeps a short unordered list while it has few children and switches
//! to a directly indexed array once linear scans stop paying off. Readers
//! never see the difference; routing is by hash code residue either way.

use smallvec::SmallVec;

use crate::TreeStats;

/// Number of levels in the tree, counting the root table as level 0. Entries
/// that exhaust every level land on a flat overflow chain.
pub const MAX_LEVELS: usize = 9;

/// Routing moduli for levels 1 through 8. The root table's modulus is fixed
/// at construction time instead ([`DEFAULT_ROOT_MODULUS`] unless overridden).
pub const LEVEL_PRIMES: [u64; MAX_LEVELS - 1] = [29, 23, 19, 17, 13, 11, 7, 5];

/// Default root table width. Prime, so that strided hash codes don't all
/// pile into a handful of slots.
pub const DEFAULT_ROOT_MODULUS: u64 = 31;

/// A single tree node: an entry plus the children routed below it.
///
/// `data` is `None` only transiently, while an erase is pulling a descendant
/// entry up; a node never stays value-less across calls.
#[derive(Clone)]
pub(crate) struct Node<V> {
    pub(crate) hashcode: u64,
    pub(crate) data: Option<V>,
    pub(crate) children: Children<V>,
}

/// Child storage, tagged by representation.
#[derive(Clone)]
pub(crate) enum Children<V> {
    /// Unordered list, appended on insert and scanned linearly. Children
    /// occupy pairwise-distinct residue slots of the next level's modulus.
    /// At the deepest level this doubles as the overflow chain, where no
    /// next modulus exists and duplicates of residues are expected.
    Sparse(SmallVec<[Box<Node<V>>; 4]>),
    /// One slot per residue of the next level's modulus, indexed directly.
    Dense(Box<[Option<Box<Node<V>>>]>),
}

impl<V> Node<V> {
    pub(crate) fn entry(hashcode: u64, value: V) -> Self {
        Self {
            hashcode,
            data: Some(value),
            children: Children::empty(),
        }
    }

    pub(crate) fn is_childless(&self) -> bool {
        self.children.is_empty()
    }

    /// Refill a node whose entry was just taken out by promoting the first
    /// child's entry, recursively, so no value-less routing node is left on
    /// the path. "First" is index 0 for sparse children and the lowest
    /// occupied slot for dense ones.
    ///
    /// Returns `false` when the node has no children at all; the caller must
    /// detach it from its parent instead.
    ///
    /// Promotion keeps routing intact: a descendant's hash code matched this
    /// node's residue slot on the way down, so it still belongs here.
    pub(crate) fn promote_first(&mut self) -> bool {
        let Node {
            hashcode,
            data,
            children,
        } = self;
        match children {
            Children::Sparse(list) => {
                if list.is_empty() {
                    return false;
                }
                let child = &mut list[0];
                *hashcode = child.hashcode;
                *data = child.data.take();
                if !child.promote_first() {
                    list.remove(0);
                }
                true
            }
            Children::Dense(slots) => {
                let Some(idx) = slots.iter().position(Option::is_some) else {
                    return false;
                };
                let child = slots[idx].as_mut().expect("slot checked occupied");
                *hashcode = child.hashcode;
                *data = child.data.take();
                if !child.promote_first() {
                    slots[idx] = None;
                }
                true
            }
        }
    }

    pub(crate) fn collect_stats(&self, depth: usize, stats: &mut TreeStats) {
        if self.data.is_some() {
            stats.entries += 1;
        }
        stats.max_depth = stats.max_depth.max(depth);
        match &self.children {
            Children::Sparse(list) => {
                if depth + 1 == MAX_LEVELS {
                    stats.chain_entries += list.len();
                } else if !list.is_empty() {
                    stats.sparse_nodes += 1;
                }
                for child in list {
                    child.collect_stats(depth + 1, stats);
                }
            }
            Children::Dense(slots) => {
                stats.dense_nodes += 1;
                for child in slots.iter().flatten() {
                    child.collect_stats(depth + 1, stats);
                }
            }
        }
    }
}

impl<V> Children<V> {
    pub(crate) fn empty() -> Self {
        Children::Sparse(SmallVec::new())
    }

    pub(crate) fn dense(modulus: u64) -> Self {
        Children::Dense((0..modulus).map(|_| None).collect())
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Children::Sparse(list) => list.is_empty(),
            Children::Dense(slots) => slots.iter().all(Option::is_none),
        }
    }
}
