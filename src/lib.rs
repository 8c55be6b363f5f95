//! # hashtree-rs
//!
//! A bounded-depth, multi-level associative container mapping caller-supplied
//! 64-bit hash codes to owned values.
//!
//! Instead of rehashing one flat table as it fills, [`HashTree`] routes each
//! key through a fixed schedule of prime moduli: a configurable root table
//! (31 slots by default) followed by levels of 29, 23, 19, 17, 13, 11, 7 and
//! 5 slots. A key lodges at the first level whose residue slot is free, so a
//! lookup touches at most nine nodes before falling back to a flat overflow
//! chain, and no operation ever rebuilds the table wholesale. Interior nodes
//! adapt their child storage between a short linear list and a directly
//! indexed array as they fill.
//!
//! Keys are hash codes the caller computes however it likes; the container
//! hashes nothing itself and treats equal codes as the same key. Keys are
//! unique: a second insert under a live code is a no-op that keeps the first
//! value.
//!
//! The tree is a plain owned value. `&HashTree` reads may be shared across
//! threads (`Sync` when `V: Sync`); mutation needs exclusive access, with any
//! cross-thread coordination supplied by the caller.
//!
//! ## Example
//!
//! ```rust
//! use hashtree_rs::HashTree;
//!
//! let mut tree: HashTree<&str> = HashTree::new();
//! assert!(tree.insert(0xfeed, "hello"));
//! assert!(!tree.insert(0xfeed, "shadowed"));
//!
//! assert_eq!(tree.get(0xfeed), Some(&"hello"));
//! assert_eq!(tree.count(0xfeed), 1);
//! assert_eq!(tree.erase(0xfeed), Some("hello"));
//! assert!(tree.is_empty());
//! ```

#![deny(unsafe_code)]

mod node;

use std::mem;

use node::{Children, Node};
pub use node::{DEFAULT_ROOT_MODULUS, LEVEL_PRIMES, MAX_LEVELS};

// ===== Diagnostics =====

/// Structural diagnostics gathered by walking the whole tree. Intended for
/// logging and tests; all counters are recomputed on every [`HashTree::stats`]
/// call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Entries currently holding a value. Always equals `len()`.
    pub entries: usize,
    /// Interior nodes whose children are in sparse (linear list) form.
    pub sparse_nodes: usize,
    /// Interior nodes whose children are in dense (indexed array) form.
    pub dense_nodes: usize,
    /// Entries parked on overflow chains past the deepest routed level.
    pub chain_entries: usize,
    /// Deepest node level reached; root table nodes are level 0 and chain
    /// entries sit at [`MAX_LEVELS`].
    pub max_depth: usize,
}

// ===== Tree =====

/// Fixed-depth multi-level hash tree. See the crate docs for the layout.
#[derive(Clone)]
pub struct HashTree<V> {
    root_modulus: u64,
    head: Vec<Option<Box<Node<V>>>>,
    size: usize,
}

impl<V> HashTree<V> {
    /// An empty tree with the default root table width of
    /// [`DEFAULT_ROOT_MODULUS`] slots.
    pub fn new() -> Self {
        Self::with_root_modulus(DEFAULT_ROOT_MODULUS)
    }

    /// An empty tree whose root table has `modulus` slots. Prime widths break
    /// up strided hash code patterns; composite ones work but collide more.
    ///
    /// # Panics
    ///
    /// Panics if `modulus` is zero.
    pub fn with_root_modulus(modulus: u64) -> Self {
        assert!(modulus > 0, "root modulus must be non-zero");
        Self {
            root_modulus: modulus,
            head: (0..modulus).map(|_| None).collect(),
            size: 0,
        }
    }

    /// Number of entries in the tree. O(1).
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of entries under this hash code: 0 or 1, keys being unique.
    pub fn count(&self, hashcode: u64) -> usize {
        usize::from(self.get(hashcode).is_some())
    }

    pub fn contains(&self, hashcode: u64) -> bool {
        self.get(hashcode).is_some()
    }

    /// Borrow the value stored under `hashcode`.
    pub fn get(&self, hashcode: u64) -> Option<&V> {
        self.find_node(hashcode).and_then(|n| n.data.as_ref())
    }

    /// Insert an entry. Returns `true` when it was added and `false` when an
    /// entry under this hash code already exists, in which case the tree is
    /// untouched and `value` is dropped.
    pub fn insert(&mut self, hashcode: u64, value: V) -> bool {
        let slot = (hashcode % self.root_modulus) as usize;
        let inserted = match &mut self.head[slot] {
            empty @ None => {
                *empty = Some(Box::new(Node::entry(hashcode, value)));
                true
            }
            Some(head) if head.hashcode == hashcode => false,
            Some(head) => Self::insert_below(head, 1, hashcode, value),
        };
        if inserted {
            self.size += 1;
        }
        inserted
    }

    /// Remove the entry under `hashcode` and hand its value back. Absent
    /// keys return `None` with no side effects.
    pub fn erase(&mut self, hashcode: u64) -> Option<V> {
        let slot = (hashcode % self.root_modulus) as usize;
        let head = self.head[slot].as_mut()?;

        let removed = if head.hashcode == hashcode {
            let value = head.data.take()?;
            if !head.promote_first() {
                self.head[slot] = None;
            }
            Some(value)
        } else {
            Self::erase_below(head, 1, hashcode)
        };
        if removed.is_some() {
            self.size -= 1;
        }
        removed
    }

    /// Drop every entry. The root table keeps its configured width and the
    /// tree remains usable.
    pub fn clear(&mut self) {
        for slot in &mut self.head {
            *slot = None;
        }
        self.size = 0;
    }

    /// Exchange the entire contents with another tree, root widths included.
    /// O(1): only the top-level handles move.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Iterate over `(hashcode, &value)` pairs in unspecified order.
    pub fn iter(&self) -> Iter<'_, V> {
        let mut stack: Vec<&Node<V>> = Vec::new();
        for node in self.head.iter().rev().flatten() {
            stack.push(node);
        }
        Iter { stack }
    }

    /// Walk the tree and report its shape. O(n).
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        for node in self.head.iter().flatten() {
            node.collect_stats(0, &mut stats);
        }
        stats
    }

    // ===== Descent internals =====

    fn find_node(&self, hashcode: u64) -> Option<&Node<V>> {
        let slot = (hashcode % self.root_modulus) as usize;
        let mut cur = self.head[slot].as_deref()?;
        if cur.hashcode == hashcode {
            return Some(cur);
        }
        for level in 1..MAX_LEVELS {
            let modulus = LEVEL_PRIMES[level - 1];
            let slot = hashcode % modulus;
            let child = match &cur.children {
                Children::Sparse(list) => list
                    .iter()
                    .find(|c| c.hashcode % modulus == slot)
                    .map(|c| &**c),
                Children::Dense(slots) => slots[slot as usize].as_deref(),
            }?;
            if child.hashcode == hashcode {
                return Some(child);
            }
            cur = child;
        }
        // Past the deepest level there is no next modulus; the chain is
        // always in sparse form and scanned whole.
        match &cur.children {
            Children::Sparse(chain) => chain
                .iter()
                .find(|c| c.hashcode == hashcode)
                .map(|c| &**c),
            Children::Dense(_) => unreachable!("dense children past the deepest level"),
        }
    }

    /// Place an entry somewhere below `node`, which sits at level `level - 1`
    /// on the key's routing path and holds a different hash code.
    fn insert_below(node: &mut Node<V>, level: usize, hashcode: u64, value: V) -> bool {
        if level == MAX_LEVELS {
            return Self::chain_insert(node, hashcode, value);
        }
        let modulus = LEVEL_PRIMES[level - 1];
        let slot = hashcode % modulus;

        let children_len = match &mut node.children {
            Children::Sparse(list) => {
                if let Some(child) = list.iter_mut().find(|c| c.hashcode % modulus == slot) {
                    if child.hashcode == hashcode {
                        return false;
                    }
                    return Self::insert_below(child, level + 1, hashcode, value);
                }
                list.push(Box::new(Node::entry(hashcode, value)));
                list.len()
            }
            Children::Dense(slots) => {
                return match &mut slots[slot as usize] {
                    Some(child) if child.hashcode == hashcode => false,
                    Some(child) => Self::insert_below(child, level + 1, hashcode, value),
                    empty @ None => {
                        *empty = Some(Box::new(Node::entry(hashcode, value)));
                        true
                    }
                };
            }
        };

        // Linear scans only beat direct indexing while the list stays short;
        // switch representations at the crossover.
        if children_len as u64 * 2 >= modulus {
            Self::densify(node, level);
        }
        true
    }

    fn chain_insert(node: &mut Node<V>, hashcode: u64, value: V) -> bool {
        let Children::Sparse(chain) = &mut node.children else {
            unreachable!("dense children past the deepest level");
        };
        if chain.iter().any(|c| c.hashcode == hashcode) {
            return false;
        }
        chain.push(Box::new(Node::entry(hashcode, value)));
        true
    }

    /// Rebuild a node's sparse child list into a dense array sized to the
    /// next level's modulus, each child landing on its residue slot. Sparse
    /// children occupy distinct slots by construction, but should two ever
    /// collide the loser's subtree is re-inserted below the occupant rather
    /// than overwritten, so conversion can never lose an entry.
    fn densify(node: &mut Node<V>, level: usize) {
        let modulus = LEVEL_PRIMES[level - 1];
        let Children::Sparse(list) = mem::replace(&mut node.children, Children::dense(modulus))
        else {
            unreachable!("densify is only reached from the sparse arm");
        };
        let Children::Dense(slots) = &mut node.children else {
            unreachable!("children were just made dense");
        };
        for child in list {
            let slot = (child.hashcode % modulus) as usize;
            match &mut slots[slot] {
                empty @ None => *empty = Some(child),
                Some(occupant) => Self::graft(occupant, level + 1, child),
            }
        }
    }

    /// Re-insert every entry of `subtree` below `node`, whose children are
    /// routed at `level`. The subtree's shape is discarded; only its entries
    /// survive, re-routed one level deeper than they were.
    fn graft(node: &mut Node<V>, level: usize, mut subtree: Box<Node<V>>) {
        let children = mem::replace(&mut subtree.children, Children::empty());
        if let Some(value) = subtree.data.take() {
            Self::insert_below(node, level, subtree.hashcode, value);
        }
        match children {
            Children::Sparse(list) => {
                for child in list {
                    Self::graft(node, level, child);
                }
            }
            Children::Dense(slots) => {
                for child in slots.into_vec().into_iter().flatten() {
                    Self::graft(node, level, child);
                }
            }
        }
    }

    fn erase_below(node: &mut Node<V>, level: usize, hashcode: u64) -> Option<V> {
        if level == MAX_LEVELS {
            let Children::Sparse(chain) = &mut node.children else {
                unreachable!("dense children past the deepest level");
            };
            let idx = chain.iter().position(|c| c.hashcode == hashcode)?;
            let mut victim = chain.remove(idx);
            debug_assert!(victim.is_childless(), "chain entries never have children");
            return victim.data.take();
        }

        let modulus = LEVEL_PRIMES[level - 1];
        let slot = hashcode % modulus;
        match &mut node.children {
            Children::Sparse(list) => {
                let idx = list.iter().position(|c| c.hashcode % modulus == slot)?;
                let child = &mut list[idx];
                if child.hashcode == hashcode {
                    let value = child.data.take()?;
                    if !child.promote_first() {
                        list.remove(idx);
                    }
                    Some(value)
                } else {
                    let value = Self::erase_below(child, level + 1, hashcode)?;
                    // A node stripped of both value and children must not
                    // linger as a dead branch.
                    if child.data.is_none() && child.is_childless() {
                        list.remove(idx);
                    }
                    Some(value)
                }
            }
            Children::Dense(slots) => {
                let child = slots[slot as usize].as_mut()?;
                if child.hashcode == hashcode {
                    let value = child.data.take()?;
                    if !child.promote_first() {
                        slots[slot as usize] = None;
                    }
                    Some(value)
                } else {
                    let value = Self::erase_below(child, level + 1, hashcode)?;
                    if child.data.is_none() && child.is_childless() {
                        slots[slot as usize] = None;
                    }
                    Some(value)
                }
            }
        }
    }
}

impl<V> Default for HashTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for HashTree<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, V> IntoIterator for &'a HashTree<V> {
    type Item = (u64, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ===== Iteration =====

/// Iterator over `(hashcode, &value)` pairs in unspecified order.
pub struct Iter<'a, V> {
    stack: Vec<&'a Node<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (u64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match &node.children {
                Children::Sparse(list) => {
                    for child in list.iter().rev() {
                        self.stack.push(child);
                    }
                }
                Children::Dense(slots) => {
                    for child in slots.iter().rev().flatten() {
                        self.stack.push(child);
                    }
                }
            }
            if let Some(value) = node.data.as_ref() {
                return Some((node.hashcode, value));
            }
        }
        None
    }
}


#[cfg(test)]
mod proptests;
