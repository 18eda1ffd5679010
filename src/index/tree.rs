//! Ordered index
//!
//! In-memory B+tree mapping each distinct key to its duplicate chain.
//!
//! ```text
//!                 [ k20 | k40 ]              interior: separators only
//!                /      |      \
//!     [k03 k11 k17] [k20 k33] [k40 k52 k60]  leaves: (key, chain) pairs
//! ```
//!
//! ## Ordering
//! Every descent, split and neighbor query goes through the store's
//! comparator; raw byte order is never consulted.
//!
//! ## Balancing
//! - Insert: a node holding more than `capacity` items splits in half and
//!   pushes a separator to its parent; a root split grows the tree.
//! - Remove: a non-root node left with fewer than `capacity / 2` items
//!   borrows from a sibling or merges with it; an interior root left with
//!   a single child is replaced by that child.
//!
//! ## Neighbor queries
//! `successor` / `predecessor` descend once and fall back to the leftmost
//! (rightmost) entry of the adjacent subtree, so both are O(log n) and
//! work for keys that are not stored.
//!
//! ## Thread Safety
//! The index is not synchronized. The store wraps it in an RwLock.

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::comparator::{KeyComparator, SharedComparator};
use crate::error::{HoardError, Result};

use super::node::{InteriorNode, LeafNode, Node, SearchResult, Split};
use super::{DuplicateChain, Key};

/// Borrowed view of one entry
#[derive(Debug, Clone, Copy)]
pub struct EntryRef<'a> {
    pub key: &'a Key,
    pub chain: &'a DuplicateChain,
}

impl<'a> EntryRef<'a> {
    fn from_pair((key, chain): (&'a Key, &'a DuplicateChain)) -> Self {
        Self { key, chain }
    }
}

/// Approximate-match mode for [`OrderedIndex::seek`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Match {
    #[default]
    Exact,
    LessOrEqual,
    GreaterOrEqual,
    Less,
    Greater,
}

/// The ordered index
#[derive(Debug)]
pub struct OrderedIndex {
    root: Node,
    comparator: SharedComparator,
    capacity: usize,
    duplicates: bool,
    len: usize,
}

impl OrderedIndex {
    /// Create an empty index
    pub fn new(comparator: SharedComparator, capacity: usize, duplicates: bool) -> Self {
        Self {
            root: Node::Leaf(LeafNode::default()),
            comparator,
            capacity: capacity.max(crate::config::Config::MIN_NODE_CAPACITY),
            duplicates,
            len: 0,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn comparator(&self) -> &SharedComparator {
        &self.comparator
    }

    /// Swap the comparator. Only allowed while the index is empty, since
    /// existing structure was built under the old order.
    pub fn set_comparator(&mut self, comparator: SharedComparator) -> Result<()> {
        if !self.is_empty() {
            return Err(HoardError::InvalidArgument(format!(
                "cannot replace comparator on a store holding {} entries",
                self.len
            )));
        }
        debug!(comparator = comparator.name(), "comparator installed");
        self.comparator = comparator;
        Ok(())
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of records across all chains
    pub fn record_count(&self) -> usize {
        self.iter().map(|entry| entry.chain.count()).sum()
    }

    pub fn duplicates_enabled(&self) -> bool {
        self.duplicates
    }

    /// Number of levels (1 for a lone leaf)
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut node = &self.root;
        while let Node::Interior(inner) = node {
            depth += 1;
            node = &inner.children[0];
        }
        depth
    }

    fn min_occupancy(&self) -> usize {
        self.capacity / 2
    }

    // =========================================================================
    // Point Lookup
    // =========================================================================

    /// Exact match via the comparator
    pub fn get(&self, key: &[u8]) -> Option<EntryRef<'_>> {
        entry(&self.root, key, self.comparator.as_ref()).map(EntryRef::from_pair)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Mutable access to an entry's chain, together with the stored key
    pub(crate) fn get_mut(&mut self, key: &[u8]) -> Option<(&Key, &mut DuplicateChain)> {
        entry_mut(&mut self.root, key, self.comparator.as_ref())
    }

    // =========================================================================
    // Structural Mutation
    // =========================================================================

    /// Add a new entry. Fails with `KeyExists` if the key is present.
    pub fn insert_entry(&mut self, key: Key, chain: DuplicateChain) -> Result<()> {
        let cmp = self.comparator.as_ref();
        let split = insert_into(&mut self.root, key, chain, cmp, self.capacity)?;
        self.len += 1;

        if let Some(Split { separator, right }) = split {
            let left = std::mem::replace(&mut self.root, Node::Leaf(LeafNode::default()));
            self.root = Node::Interior(InteriorNode {
                separators: vec![separator],
                children: vec![left, right],
            });
            debug!(depth = self.depth(), entries = self.len, "index root split");
        }
        Ok(())
    }

    /// Remove an entry with all its records
    pub fn remove_entry(&mut self, key: &[u8]) -> Option<(Key, DuplicateChain)> {
        let min = self.min_occupancy();
        let removed = remove_from(&mut self.root, key, self.comparator.as_ref(), min)?;
        self.len -= 1;

        let collapsed = match &mut self.root {
            Node::Interior(inner) if inner.separators.is_empty() => inner.children.pop(),
            _ => None,
        };
        if let Some(child) = collapsed {
            self.root = child;
            debug!(depth = self.depth(), entries = self.len, "index root collapsed");
        }
        Some(removed)
    }

    // =========================================================================
    // Ordered Navigation
    // =========================================================================

    pub fn first(&self) -> Option<EntryRef<'_>> {
        self.root.leftmost().map(EntryRef::from_pair)
    }

    pub fn last(&self) -> Option<EntryRef<'_>> {
        self.root.rightmost().map(EntryRef::from_pair)
    }

    /// Smallest entry strictly greater than `key` (which need not be stored)
    pub fn successor(&self, key: &[u8]) -> Option<EntryRef<'_>> {
        successor(&self.root, key, self.comparator.as_ref()).map(EntryRef::from_pair)
    }

    /// Largest entry strictly less than `key` (which need not be stored)
    pub fn predecessor(&self, key: &[u8]) -> Option<EntryRef<'_>> {
        predecessor(&self.root, key, self.comparator.as_ref()).map(EntryRef::from_pair)
    }

    /// Exact or approximate lookup
    pub fn seek(&self, key: &[u8], mode: Match) -> Option<EntryRef<'_>> {
        match mode {
            Match::Exact => self.get(key),
            Match::LessOrEqual => self.get(key).or_else(|| self.predecessor(key)),
            Match::GreaterOrEqual => self.get(key).or_else(|| self.successor(key)),
            Match::Less => self.predecessor(key),
            Match::Greater => self.successor(key),
        }
    }

    /// Entries in comparator order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: vec![std::slice::from_ref(&self.root).iter()],
            leaf: None,
        }
    }

    // =========================================================================
    // Integrity Check
    // =========================================================================

    /// Walk the whole tree and check ordering, bounds, occupancy and depth.
    ///
    /// Ordering violations mean the comparator is not a total order and are
    /// reported as `Precondition`; shape violations as `Storage`.
    pub fn verify(&self) -> Result<()> {
        let mut checker = Checker {
            cmp: self.comparator.as_ref(),
            capacity: self.capacity,
            min: self.min_occupancy(),
            leaf_depth: None,
            entries: 0,
        };
        checker.visit(&self.root, None, None, 1, true)?;

        if checker.entries != self.len {
            return Err(HoardError::Storage(format!(
                "entry count mismatch: counted {}, tracked {}",
                checker.entries, self.len
            )));
        }
        trace!(entries = self.len, depth = self.depth(), "index verified");
        Ok(())
    }
}

// =============================================================================
// Recursive Helpers
// =============================================================================

fn entry<'a>(
    node: &'a Node,
    key: &[u8],
    cmp: &dyn KeyComparator,
) -> Option<(&'a Key, &'a DuplicateChain)> {
    match node {
        Node::Leaf(leaf) => match leaf.search(key, cmp) {
            SearchResult::Found(i) => Some((&leaf.keys[i], &leaf.chains[i])),
            SearchResult::NotFound(_) => None,
        },
        Node::Interior(inner) => entry(&inner.children[inner.child_index(key, cmp)], key, cmp),
    }
}

fn entry_mut<'a>(
    node: &'a mut Node,
    key: &[u8],
    cmp: &dyn KeyComparator,
) -> Option<(&'a Key, &'a mut DuplicateChain)> {
    match node {
        Node::Leaf(leaf) => match leaf.search(key, cmp) {
            SearchResult::Found(i) => Some((&leaf.keys[i], &mut leaf.chains[i])),
            SearchResult::NotFound(_) => None,
        },
        Node::Interior(inner) => {
            let ci = inner.child_index(key, cmp);
            entry_mut(&mut inner.children[ci], key, cmp)
        }
    }
}

fn insert_into(
    node: &mut Node,
    key: Key,
    chain: DuplicateChain,
    cmp: &dyn KeyComparator,
    capacity: usize,
) -> Result<Option<Split>> {
    match node {
        Node::Leaf(leaf) => match leaf.search(&key, cmp) {
            SearchResult::Found(_) => Err(HoardError::KeyExists),
            SearchResult::NotFound(i) => {
                leaf.keys.insert(i, key);
                leaf.chains.insert(i, chain);
                if leaf.keys.len() > capacity {
                    trace!(size = leaf.keys.len(), "leaf split");
                    Ok(Some(leaf.split()))
                } else {
                    Ok(None)
                }
            }
        },
        Node::Interior(inner) => {
            let ci = inner.child_index(&key, cmp);
            let Some(Split { separator, right }) =
                insert_into(&mut inner.children[ci], key, chain, cmp, capacity)?
            else {
                return Ok(None);
            };
            inner.separators.insert(ci, separator);
            inner.children.insert(ci + 1, right);
            if inner.separators.len() > capacity {
                trace!(size = inner.separators.len(), "interior split");
                Ok(Some(inner.split()))
            } else {
                Ok(None)
            }
        }
    }
}

fn remove_from(
    node: &mut Node,
    key: &[u8],
    cmp: &dyn KeyComparator,
    min: usize,
) -> Option<(Key, DuplicateChain)> {
    match node {
        Node::Leaf(leaf) => match leaf.search(key, cmp) {
            SearchResult::Found(i) => Some((leaf.keys.remove(i), leaf.chains.remove(i))),
            SearchResult::NotFound(_) => None,
        },
        Node::Interior(inner) => {
            let ci = inner.child_index(key, cmp);
            let removed = remove_from(&mut inner.children[ci], key, cmp, min)?;
            if inner.children[ci].len() < min {
                inner.rebalance(ci, min);
            }
            Some(removed)
        }
    }
}

fn successor<'a>(
    node: &'a Node,
    key: &[u8],
    cmp: &dyn KeyComparator,
) -> Option<(&'a Key, &'a DuplicateChain)> {
    match node {
        Node::Leaf(leaf) => {
            let i = leaf.upper_bound(key, cmp);
            leaf.keys.get(i).zip(leaf.chains.get(i))
        }
        Node::Interior(inner) => {
            let ci = inner.child_index(key, cmp);
            successor(&inner.children[ci], key, cmp)
                .or_else(|| inner.children.get(ci + 1).and_then(Node::leftmost))
        }
    }
}

fn predecessor<'a>(
    node: &'a Node,
    key: &[u8],
    cmp: &dyn KeyComparator,
) -> Option<(&'a Key, &'a DuplicateChain)> {
    match node {
        Node::Leaf(leaf) => {
            let i = leaf.lower_bound(key, cmp);
            let i = i.checked_sub(1)?;
            leaf.keys.get(i).zip(leaf.chains.get(i))
        }
        Node::Interior(inner) => {
            let ci = inner.child_index(key, cmp);
            predecessor(&inner.children[ci], key, cmp).or_else(|| {
                ci.checked_sub(1)
                    .and_then(|left| inner.children.get(left))
                    .and_then(Node::rightmost)
            })
        }
    }
}

// =============================================================================
// Iteration
// =============================================================================

/// In-order iterator over index entries
pub struct Iter<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
    leaf: Option<std::iter::Zip<std::slice::Iter<'a, Key>, std::slice::Iter<'a, DuplicateChain>>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = EntryRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pair) = self.leaf.as_mut().and_then(Iterator::next) {
                return Some(EntryRef::from_pair(pair));
            }
            self.leaf = None;

            let top = self.stack.last_mut()?;
            match top.next() {
                Some(Node::Leaf(leaf)) => {
                    self.leaf = Some(leaf.keys.iter().zip(leaf.chains.iter()));
                }
                Some(Node::Interior(inner)) => self.stack.push(inner.children.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

// =============================================================================
// Verification
// =============================================================================

struct Checker<'c> {
    cmp: &'c dyn KeyComparator,
    capacity: usize,
    min: usize,
    leaf_depth: Option<usize>,
    entries: usize,
}

impl Checker<'_> {
    fn visit(
        &mut self,
        node: &Node,
        lower: Option<&Key>,
        upper: Option<&Key>,
        depth: usize,
        is_root: bool,
    ) -> Result<()> {
        let len = node.len();
        if len > self.capacity || (!is_root && len < self.min) {
            return Err(HoardError::Storage(format!(
                "node at depth {} holds {} items (bounds {}..={})",
                depth, len, self.min, self.capacity
            )));
        }

        match node {
            Node::Leaf(leaf) => {
                if leaf.keys.len() != leaf.chains.len() {
                    return Err(HoardError::Storage("leaf key/chain count mismatch".into()));
                }
                if leaf.chains.iter().any(|chain| chain.count() == 0) {
                    return Err(HoardError::Storage("entry with an empty chain".into()));
                }
                self.check_sorted(&leaf.keys, lower, upper)?;
                match self.leaf_depth {
                    Some(expected) if expected != depth => {
                        return Err(HoardError::Storage(format!(
                            "leaf at depth {} but others at {}",
                            depth, expected
                        )));
                    }
                    _ => self.leaf_depth = Some(depth),
                }
                self.entries += leaf.keys.len();
            }
            Node::Interior(inner) => {
                if inner.children.len() != inner.separators.len() + 1 {
                    return Err(HoardError::Storage(
                        "interior separator/child count mismatch".into(),
                    ));
                }
                if is_root && inner.separators.is_empty() {
                    return Err(HoardError::Storage("interior root without separators".into()));
                }
                self.check_sorted(&inner.separators, lower, upper)?;
                for (i, child) in inner.children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { inner.separators.get(i - 1) };
                    let hi = inner.separators.get(i).or(upper);
                    self.visit(child, lo, hi, depth + 1, false)?;
                }
            }
        }
        Ok(())
    }

    /// Keys strictly ascending and inside `[lower, upper)`
    fn check_sorted(&self, keys: &[Key], lower: Option<&Key>, upper: Option<&Key>) -> Result<()> {
        for pair in keys.windows(2) {
            if self.cmp.compare(&pair[0], &pair[1]) != Ordering::Less {
                return Err(HoardError::Precondition(format!(
                    "keys {:?} and {:?} out of order",
                    pair[0], pair[1]
                )));
            }
        }
        if let (Some(lo), Some(first)) = (lower, keys.first()) {
            if self.cmp.compare(first, lo) == Ordering::Less {
                return Err(HoardError::Precondition(format!(
                    "key {:?} below separator {:?}",
                    first, lo
                )));
            }
        }
        if let (Some(hi), Some(last)) = (upper, keys.last()) {
            if self.cmp.compare(last, hi) != Ordering::Less {
                return Err(HoardError::Precondition(format!(
                    "key {:?} not below separator {:?}",
                    last, hi
                )));
            }
        }
        Ok(())
    }
}
