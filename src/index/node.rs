//! B+tree nodes
//!
//! Leaves own the entries; interior nodes only route. Separator `i` of an
//! interior node is a lower bound for child `i + 1` and an exclusive upper
//! bound for child `i`.

use std::cmp::Ordering;

use crate::comparator::KeyComparator;

use super::{DuplicateChain, Key};

/// Outcome of a binary search inside a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchResult {
    Found(usize),
    NotFound(usize),
}

/// Leaf node: parallel key / chain vectors in comparator order
#[derive(Debug, Default)]
pub(crate) struct LeafNode {
    pub keys: Vec<Key>,
    pub chains: Vec<DuplicateChain>,
}

/// Interior node: `children.len() == separators.len() + 1`
#[derive(Debug)]
pub(crate) struct InteriorNode {
    pub separators: Vec<Key>,
    pub children: Vec<Node>,
}

#[derive(Debug)]
pub(crate) enum Node {
    Leaf(LeafNode),
    Interior(InteriorNode),
}

/// Upper half of a node that overflowed, plus the key routing to it
pub(crate) struct Split {
    pub separator: Key,
    pub right: Node,
}

impl LeafNode {
    pub fn search(&self, key: &[u8], cmp: &dyn KeyComparator) -> SearchResult {
        match self.keys.binary_search_by(|candidate| cmp.compare(candidate, key)) {
            Ok(i) => SearchResult::Found(i),
            Err(i) => SearchResult::NotFound(i),
        }
    }

    /// Index of the first key strictly greater than `key`
    pub fn upper_bound(&self, key: &[u8], cmp: &dyn KeyComparator) -> usize {
        self.keys
            .partition_point(|candidate| cmp.compare(candidate, key) != Ordering::Greater)
    }

    /// Index of the first key not less than `key`
    pub fn lower_bound(&self, key: &[u8], cmp: &dyn KeyComparator) -> usize {
        self.keys
            .partition_point(|candidate| cmp.compare(candidate, key) == Ordering::Less)
    }

    pub fn split(&mut self) -> Split {
        let mid = self.keys.len() / 2;
        let keys = self.keys.split_off(mid);
        let chains = self.chains.split_off(mid);
        let separator = keys[0].clone();
        Split {
            separator,
            right: Node::Leaf(LeafNode { keys, chains }),
        }
    }
}

impl InteriorNode {
    /// Child that may contain `key`
    pub fn child_index(&self, key: &[u8], cmp: &dyn KeyComparator) -> usize {
        self.separators
            .partition_point(|sep| cmp.compare(sep, key) != Ordering::Greater)
    }

    pub fn split(&mut self) -> Split {
        let mid = self.separators.len() / 2;
        let mut separators = self.separators.split_off(mid);
        let separator = separators.remove(0);
        let children = self.children.split_off(mid + 1);
        Split {
            separator,
            right: Node::Interior(InteriorNode {
                separators,
                children,
            }),
        }
    }

    /// Restore occupancy of `children[ci]` after a removal left it short
    pub fn rebalance(&mut self, ci: usize, min: usize) {
        if self.children.len() < 2 {
            return;
        }
        if ci > 0 && self.children[ci - 1].len() > min {
            self.borrow_from_left(ci);
        } else if ci + 1 < self.children.len() && self.children[ci + 1].len() > min {
            self.borrow_from_right(ci);
        } else if ci > 0 {
            self.merge_children(ci - 1);
        } else {
            self.merge_children(ci);
        }
    }

    fn borrow_from_left(&mut self, ci: usize) {
        let (head, tail) = self.children.split_at_mut(ci);
        match (&mut head[ci - 1], &mut tail[0]) {
            (Node::Leaf(left), Node::Leaf(child)) => {
                if let (Some(key), Some(chain)) = (left.keys.pop(), left.chains.pop()) {
                    self.separators[ci - 1] = key.clone();
                    child.keys.insert(0, key);
                    child.chains.insert(0, chain);
                }
            }
            (Node::Interior(left), Node::Interior(child)) => {
                if let (Some(sep), Some(node)) = (left.separators.pop(), left.children.pop()) {
                    let down = std::mem::replace(&mut self.separators[ci - 1], sep);
                    child.separators.insert(0, down);
                    child.children.insert(0, node);
                }
            }
            _ => debug_assert!(false, "siblings at different depths"),
        }
    }

    fn borrow_from_right(&mut self, ci: usize) {
        let (head, tail) = self.children.split_at_mut(ci + 1);
        match (&mut head[ci], &mut tail[0]) {
            (Node::Leaf(child), Node::Leaf(right)) => {
                if right.keys.len() < 2 {
                    return;
                }
                child.keys.push(right.keys.remove(0));
                child.chains.push(right.chains.remove(0));
                self.separators[ci] = right.keys[0].clone();
            }
            (Node::Interior(child), Node::Interior(right)) => {
                if right.separators.is_empty() {
                    return;
                }
                let sep = right.separators.remove(0);
                let node = right.children.remove(0);
                let down = std::mem::replace(&mut self.separators[ci], sep);
                child.separators.push(down);
                child.children.push(node);
            }
            _ => debug_assert!(false, "siblings at different depths"),
        }
    }

    /// Fold `children[left_idx + 1]` into `children[left_idx]`
    fn merge_children(&mut self, left_idx: usize) {
        let separator = self.separators.remove(left_idx);
        let right = self.children.remove(left_idx + 1);
        match (&mut self.children[left_idx], right) {
            (Node::Leaf(left), Node::Leaf(right)) => {
                left.keys.extend(right.keys);
                left.chains.extend(right.chains);
            }
            (Node::Interior(left), Node::Interior(right)) => {
                left.separators.push(separator);
                left.separators.extend(right.separators);
                left.children.extend(right.children);
            }
            _ => debug_assert!(false, "siblings at different depths"),
        }
    }
}

impl Node {
    /// Occupancy: entries for a leaf, separators for an interior node
    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.keys.len(),
            Node::Interior(inner) => inner.separators.len(),
        }
    }

    pub fn leftmost(&self) -> Option<(&Key, &DuplicateChain)> {
        match self {
            Node::Leaf(leaf) => leaf.keys.first().zip(leaf.chains.first()),
            Node::Interior(inner) => inner.children.first().and_then(Node::leftmost),
        }
    }

    pub fn rightmost(&self) -> Option<(&Key, &DuplicateChain)> {
        match self {
            Node::Leaf(leaf) => leaf.keys.last().zip(leaf.chains.last()),
            Node::Interior(inner) => inner.children.last().and_then(Node::rightmost),
        }
    }
}
