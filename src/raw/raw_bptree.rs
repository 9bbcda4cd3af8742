use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt::{self, Write};

use smallvec::SmallVec;

use super::arena::Arena;
use super::handle::Handle;
use super::node::{InternalNode, LeafNode, Node};
use crate::comparator::Comparator;
use crate::config::BranchingFactor;

/// The core B+Tree implementation backing `BPTree`.
pub(crate) struct RawBPTree<K, V> {
    /// Arena storing all tree nodes.
    nodes: Arena<Node<K>>,
    /// Arena storing all values (separate from nodes so leaves stay small).
    values: Arena<V>,
    /// Handle to the root node. Starts as an empty leaf.
    root: Handle,
    /// Handle to the first (leftmost) leaf, for forward iteration.
    first_leaf: Handle,
    /// Handle to the last (rightmost) leaf, for backward iteration.
    last_leaf: Handle,
    branching_factor: BranchingFactor,
    /// Number of levels, counting the leaves.
    height: usize,
}

/// Path element for tracking traversal during inserts.
struct PathElement {
    /// Handle to the node at this level.
    node: Handle,
    /// Index of the child we descended into.
    child_index: usize,
}

/// Type alias for a path through the tree (stack of path elements).
type Path = SmallVec<[PathElement; 16]>;

impl<K, V> RawBPTree<K, V> {
    /// Creates a tree whose root is a single empty leaf.
    pub(crate) fn new(branching_factor: BranchingFactor) -> Self {
        let mut nodes = Arena::new();
        let root = nodes.alloc(Node::Leaf(LeafNode::new()));
        Self {
            nodes,
            values: Arena::new(),
            root,
            first_leaf: root,
            last_leaf: root,
            branching_factor,
            height: 1,
        }
    }

    /// Every insert allocates exactly one value, so the value arena counts the entries.
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) const fn height(&self) -> usize {
        self.height
    }

    pub(crate) const fn branching_factor(&self) -> BranchingFactor {
        self.branching_factor
    }

    pub(crate) fn first_leaf(&self) -> Handle {
        self.first_leaf
    }

    pub(crate) fn last_leaf(&self) -> Handle {
        self.last_leaf
    }

    pub(crate) fn leaf(&self, handle: Handle) -> &LeafNode<K> {
        self.nodes.get(handle).as_leaf()
    }

    pub(crate) fn value(&self, handle: Handle) -> &V {
        self.values.get(handle)
    }

    /// Returns the smallest key reachable from `handle` by following first children.
    ///
    /// `None` only for an empty leaf, which can only be the root of an empty tree.
    pub(crate) fn first_leaf_key(&self, handle: Handle) -> Option<&K> {
        let mut current = handle;
        loop {
            match self.nodes.get(current) {
                Node::Internal(internal) => current = internal.child(0),
                Node::Leaf(leaf) => return leaf.first_key(),
            }
        }
    }

    /// Writes the keys level by level: one line per level, siblings grouped in braces.
    pub(crate) fn fmt_levels(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    where
        K: fmt::Display,
    {
        let mut level: Vec<&[Handle]> = alloc::vec![core::slice::from_ref(&self.root)];

        while !level.is_empty() {
            let mut next_level: Vec<&[Handle]> = Vec::new();

            for (group_index, group) in level.iter().enumerate() {
                if group_index > 0 {
                    f.write_str(", ")?;
                }
                f.write_char('{')?;
                for (node_index, &handle) in group.iter().enumerate() {
                    if node_index > 0 {
                        f.write_str(", ")?;
                    }
                    let node = self.nodes.get(handle);
                    write_keys(f, node.keys())?;
                    if let Node::Internal(internal) = node {
                        next_level.push(internal.children());
                    }
                }
                f.write_char('}')?;
            }

            f.write_char('\n')?;
            level = next_level;
        }

        Ok(())
    }
}

fn write_keys<K: fmt::Display>(f: &mut fmt::Formatter<'_>, keys: &[K]) -> fmt::Result {
    f.write_char('[')?;
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key}")?;
    }
    f.write_char(']')
}

impl<K: Clone + Ord, V> RawBPTree<K, V> {
    /// Inserts a key-value pair. Duplicate keys are stored alongside existing ones.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        let value_handle = self.values.alloc(value);

        // Build path from root to leaf
        let mut path: Path = SmallVec::new();
        let mut current = self.root;
        while let Node::Internal(internal) = self.nodes.get(current) {
            let child_index = internal.lower_index(&key);
            path.push(PathElement {
                node: current,
                child_index,
            });
            current = internal.child(child_index);
        }

        self.nodes.get_mut(current).as_leaf_mut().insert(key, value_handle);

        // Split bottom-up for as long as the node we just grew overflows.
        let branching_factor = self.branching_factor.get();
        while let Some(elem) = path.pop() {
            if !self.nodes.get(current).is_overflow(branching_factor) {
                return;
            }
            let (lower, separator) = self.split(current);
            self.nodes.get_mut(elem.node).as_internal_mut().insert_child(elem.child_index, separator, lower);
            current = elem.node;
        }

        if self.nodes.get(current).is_overflow(branching_factor) {
            self.grow_root();
        }
    }

    /// Splits the root and puts a new internal root above the two halves.
    fn grow_root(&mut self) {
        let old_root = self.root;
        let (lower, separator) = self.split(old_root);
        self.root = self.nodes.alloc(Node::Internal(InternalNode::new_root(lower, separator, old_root)));
        self.height += 1;

        tracing::debug!(height = self.height, len = self.len(), "grew a new root");
    }

    /// Splits an overflowed node, returning the new lower sibling and the separator that
    /// belongs between it and `handle` in the parent.
    fn split(&mut self, handle: Handle) -> (Handle, K) {
        let lower = match self.nodes.get_mut(handle) {
            Node::Leaf(leaf) => {
                let mut lower = leaf.split();
                let old_prev = leaf.prev();
                lower.set_prev(old_prev);
                lower.set_next(Some(handle));

                let lower_handle = self.nodes.alloc(Node::Leaf(lower));

                // Splice the new leaf in front of `handle`.
                self.nodes.get_mut(handle).as_leaf_mut().set_prev(Some(lower_handle));
                match old_prev {
                    Some(prev) => self.nodes.get_mut(prev).as_leaf_mut().set_next(Some(lower_handle)),
                    None => self.first_leaf = lower_handle,
                }

                tracing::trace!(?handle, ?lower_handle, "split leaf");
                lower_handle
            }
            Node::Internal(internal) => {
                let lower = internal.split();
                let lower_handle = self.nodes.alloc(Node::Internal(lower));

                tracing::trace!(?handle, ?lower_handle, "split internal node");
                lower_handle
            }
        };

        let separator = self
            .first_leaf_key(handle)
            .expect("`RawBPTree::split()` - upper half of a split is empty!")
            .clone();

        (lower, separator)
    }

    /// Collects the values whose keys satisfy `comparator` against `key`, in ascending
    /// key order.
    pub(crate) fn range_search<Q>(&self, key: &Q, comparator: Comparator) -> Vec<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let entry = self.entry_leaf(key, comparator);
        let mut matches = Vec::new();

        match comparator {
            Comparator::GreaterOrEqual => {
                let mut current = Some(entry);
                while let Some(handle) = current {
                    let leaf = self.leaf(handle);
                    matches.extend(leaf.entries().filter(|(k, _)| (*k).borrow() >= key).map(|(_, v)| self.value(v)));
                    current = leaf.next();
                }
            }
            Comparator::Equal => {
                let mut current = Some(entry);
                'chain: while let Some(handle) = current {
                    let leaf = self.leaf(handle);
                    for (k, v) in leaf.entries() {
                        if k.borrow() > key {
                            break 'chain;
                        }
                        if k.borrow() == key {
                            matches.push(self.value(v));
                        }
                    }
                    current = leaf.next();
                }
            }
            Comparator::LessOrEqual => {
                // Walk left, then emit back to front so the output stays ascending.
                let mut leaves: SmallVec<[Handle; 16]> = SmallVec::new();
                let mut current = Some(entry);
                while let Some(handle) = current {
                    leaves.push(handle);
                    current = self.leaf(handle).prev();
                }
                for &handle in leaves.iter().rev() {
                    let leaf = self.leaf(handle);
                    matches.extend(leaf.entries().filter(|(k, _)| (*k).borrow() <= key).map(|(_, v)| self.value(v)));
                }
            }
        }

        matches
    }

    /// Descends once to the leaf where the directional scan for `comparator` starts.
    fn entry_leaf<Q>(&self, key: &Q, comparator: Comparator) -> Handle
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;
        while let Node::Internal(internal) = self.nodes.get(current) {
            let child_index = match comparator {
                Comparator::LessOrEqual => internal.upper_index(key),
                Comparator::Equal | Comparator::GreaterOrEqual => internal.lower_index(key),
            };
            current = internal.child(child_index);
        }
        current
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::{String, ToString};
    use proptest::prelude::*;

    impl<K: Ord + Clone + fmt::Debug, V> RawBPTree<K, V> {
        /// Validates all B+Tree invariants. Panics with a descriptive message if any are violated.
        /// This is intended for use in tests to catch tree corruption.
        pub(crate) fn validate_invariants(&self) {
            let mut errors: Vec<String> = Vec::new();

            // 1. Validate tree structure and collect all leaves
            let mut all_leaves: Vec<Handle> = Vec::new();
            let mut leaf_depth: Option<usize> = None;
            self.validate_node(self.root, 0, &mut leaf_depth, &mut all_leaves, &mut errors);

            if leaf_depth.map(|depth| depth + 1) != Some(self.height) {
                errors.push(format!("height mismatch: stored={}, leaf depth={:?}", self.height, leaf_depth));
            }

            // 2. Validate leaf chain matches collected leaves
            self.validate_leaf_chain(&all_leaves, &mut errors);

            // 3. Validate len matches actual count
            let actual_count: usize = all_leaves.iter().map(|&h| self.leaf(h).key_count()).sum();
            if self.len() != actual_count {
                errors.push(format!("len mismatch: self.len()={}, actual count={}", self.len(), actual_count));
            }

            assert!(errors.is_empty(), "Tree invariant violations:\n{}", errors.join("\n"));
        }

        /// Returns the (min, max) key of the subtree, if it holds any.
        fn validate_node(
            &self,
            handle: Handle,
            depth: usize,
            leaf_depth: &mut Option<usize>,
            all_leaves: &mut Vec<Handle>,
            errors: &mut Vec<String>,
        ) -> Option<(K, K)> {
            let node = self.nodes.get(handle);
            let branching_factor = self.branching_factor.get();

            if node.key_count() >= branching_factor {
                errors.push(format!("Overflowed node left behind at {handle:?}: {} keys", node.key_count()));
            }
            if node.keys().windows(2).any(|pair| pair[0] > pair[1]) {
                errors.push(format!("Keys not sorted at {handle:?}: {:?}", node.keys()));
            }
            if handle != self.root && node.key_count() == 0 {
                errors.push(format!("Empty non-root node at {handle:?}"));
            }

            match node {
                Node::Leaf(leaf) => {
                    match *leaf_depth {
                        None => *leaf_depth = Some(depth),
                        Some(expected) if expected != depth => {
                            errors.push(format!("Leaf depth mismatch: expected {expected}, got {depth} at {handle:?}"));
                        }
                        Some(_) => {}
                    }
                    all_leaves.push(handle);
                    Some((leaf.keys().first()?.clone(), leaf.keys().last()?.clone()))
                }
                Node::Internal(internal) => {
                    if internal.children().len() != internal.keys().len() + 1 {
                        errors.push(format!(
                            "Child count mismatch at {handle:?}: {} children, {} keys",
                            internal.children().len(),
                            internal.keys().len()
                        ));
                    }

                    let mut bounds: Option<(K, K)> = None;
                    for (i, &child) in internal.children().iter().enumerate() {
                        let Some((min, max)) = self.validate_node(child, depth + 1, leaf_depth, all_leaves, errors)
                        else {
                            continue;
                        };
                        // children[i] holds keys in [keys[i - 1], keys[i]].
                        if i > 0 && min < internal.keys()[i - 1] {
                            errors.push(format!("Child {i} of {handle:?} holds {min:?} below its separator"));
                        }
                        if i < internal.keys().len() && max > internal.keys()[i] {
                            errors.push(format!("Child {i} of {handle:?} holds {max:?} above its separator"));
                        }
                        bounds = Some(match bounds {
                            None => (min, max),
                            Some((lo, _)) => (lo, max),
                        });
                    }
                    bounds
                }
            }
        }

        fn validate_leaf_chain(&self, all_leaves: &[Handle], errors: &mut Vec<String>) {
            if all_leaves.first() != Some(&self.first_leaf) {
                errors.push(format!("first_leaf mismatch: expected {:?}, got {:?}", all_leaves.first(), self.first_leaf));
            }
            if all_leaves.last() != Some(&self.last_leaf) {
                errors.push(format!("last_leaf mismatch: expected {:?}, got {:?}", all_leaves.last(), self.last_leaf));
            }

            for (i, &handle) in all_leaves.iter().enumerate() {
                let leaf = self.leaf(handle);
                let expected_next = all_leaves.get(i + 1).copied();
                let expected_prev = i.checked_sub(1).map(|j| all_leaves[j]);
                if leaf.next() != expected_next {
                    errors.push(format!("Leaf chain next mismatch at index {i}: expected {expected_next:?}, got {:?}", leaf.next()));
                }
                if leaf.prev() != expected_prev {
                    errors.push(format!("Leaf chain prev mismatch at index {i}: expected {expected_prev:?}, got {:?}", leaf.prev()));
                }
            }

            // Walking the chain must produce non-decreasing keys across leaf boundaries.
            let chained: Vec<&K> = all_leaves.iter().flat_map(|&h| self.leaf(h).keys()).collect();
            if chained.windows(2).any(|pair| pair[0] > pair[1]) {
                errors.push("Leaf chain keys are not in non-decreasing order".into());
            }
        }
    }

    fn tree(branching_factor: usize) -> RawBPTree<i32, i32> {
        RawBPTree::new(BranchingFactor::new(branching_factor).unwrap())
    }

    fn dump<K: fmt::Display, V>(tree: &RawBPTree<K, V>) -> String {
        struct Levels<'a, K, V>(&'a RawBPTree<K, V>);
        impl<K: fmt::Display, V> fmt::Display for Levels<'_, K, V> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt_levels(f)
            }
        }
        Levels(tree).to_string()
    }

    fn sample() -> RawBPTree<i32, i32> {
        let mut tree = tree(3);
        for key in [5, 3, 8, 1, 4, 7, 2, 6] {
            tree.insert(key, key);
            tree.validate_invariants();
        }
        tree
    }

    #[test]
    fn empty_tree_is_a_single_empty_leaf() {
        let tree = tree(3);
        tree.validate_invariants();
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.first_leaf(), tree.last_leaf());
        assert_eq!(tree.first_leaf_key(tree.root), None);
        assert_eq!(dump(&tree), "{[]}\n");
        for comparator in [Comparator::LessOrEqual, Comparator::Equal, Comparator::GreaterOrEqual] {
            assert!(tree.range_search(&0, comparator).is_empty());
        }
    }

    #[test]
    fn sample_structure_matches_split_rules() {
        let tree = sample();
        assert_eq!(tree.height(), 3);
        assert_eq!(dump(&tree), "{[5]}\n{[3], [7]}\n{[1, 2], [3, 4]}, {[5, 6], [7, 8]}\n");
        assert_eq!(tree.first_leaf_key(tree.root), Some(&1));
    }

    #[test]
    fn root_split_puts_lower_sibling_first() {
        let mut tree = tree(3);
        for key in [5, 3, 8] {
            tree.insert(key, key);
        }
        assert_eq!(tree.height(), 2);
        assert_eq!(dump(&tree), "{[5]}\n{[3], [5, 8]}\n");
        assert_eq!(tree.leaf(tree.first_leaf()).keys(), &[3]);
        assert_eq!(tree.leaf(tree.last_leaf()).keys(), &[5, 8]);
    }

    #[test]
    fn sample_range_searches() {
        let tree = sample();
        let collect = |key: i32, comparator| tree.range_search(&key, comparator).into_iter().copied().collect::<Vec<_>>();
        assert_eq!(collect(4, Comparator::LessOrEqual), [1, 2, 3, 4]);
        assert_eq!(collect(4, Comparator::GreaterOrEqual), [4, 5, 6, 7, 8]);
        assert_eq!(collect(4, Comparator::Equal), [4]);
        assert_eq!(collect(0, Comparator::LessOrEqual), Vec::<i32>::new());
        assert_eq!(collect(9, Comparator::GreaterOrEqual), Vec::<i32>::new());
        assert_eq!(collect(9, Comparator::LessOrEqual), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn equal_search_spans_leaves() {
        let mut tree = tree(3);
        for value in 0..20 {
            tree.insert(7, value);
            tree.validate_invariants();
        }
        tree.insert(6, -1);
        tree.insert(8, -2);

        let mut found: Vec<i32> = tree.range_search(&7, Comparator::Equal).into_iter().copied().collect();
        found.sort_unstable();
        assert_eq!(found, (0..20).collect::<Vec<_>>());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn tree_invariants_maintained_after_inserts(
            branching_factor in 3usize..9,
            keys in prop::collection::vec(0i32..200, 0..500),
        ) {
            let mut tree = tree(branching_factor);
            for (value, &key) in keys.iter().enumerate() {
                tree.insert(key, value as i32);
                tree.validate_invariants();
            }
            prop_assert_eq!(tree.len(), keys.len());
        }

        #[test]
        fn searches_match_a_linear_scan(
            branching_factor in 3usize..9,
            keys in prop::collection::vec(0i32..100, 0..300),
            target in -5i32..105,
        ) {
            let mut tree = tree(branching_factor);
            for (value, &key) in keys.iter().enumerate() {
                tree.insert(key, value as i32);
            }

            let entries: Vec<(i32, i32)> = keys.iter().enumerate().map(|(v, &k)| (k, v as i32)).collect();

            for comparator in [Comparator::LessOrEqual, Comparator::Equal, Comparator::GreaterOrEqual] {
                let keep = |k: i32| match comparator {
                    Comparator::LessOrEqual => k <= target,
                    Comparator::Equal => k == target,
                    Comparator::GreaterOrEqual => k >= target,
                };
                let found: Vec<(i32, i32)> = tree
                    .range_search(&target, comparator)
                    .into_iter()
                    .map(|&v| (keys[v as usize], v))
                    .collect();

                // Ascending by key; the order among equal keys is not fixed.
                prop_assert!(found.windows(2).all(|pair| pair[0].0 <= pair[1].0));

                let mut found = found;
                let mut expected: Vec<(i32, i32)> = entries.iter().copied().filter(|&(k, _)| keep(k)).collect();
                found.sort_unstable();
                expected.sort_unstable();
                prop_assert_eq!(found, expected);
            }
        }
    }
}
