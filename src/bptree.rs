//! The public B+ tree index and its iterator.

use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt;
use core::iter::FusedIterator;

use crate::comparator::Comparator;
use crate::config::BranchingFactor;
use crate::error::Result;
use crate::raw::{Handle, RawBPTree};

/// An in-memory B+ tree mapping ordered keys to values, with three-way range search.
///
/// Keys must have a [total order]; duplicate keys are allowed and every insertion is kept
/// as its own entry. Values are stored once and handed out by reference, so a tree of
/// records can be queried repeatedly without cloning them.
///
/// Searches descend once from the root to an entry leaf and then walk the doubly linked
/// leaf chain in the direction the [`Comparator`] calls for. Results come back in
/// ascending key order; the relative order of values under one key is unspecified but
/// stable between calls.
///
/// It is a logic error for a key to be modified in such a way that the key's ordering
/// relative to any other key, as determined by the [`Ord`] trait, changes while it is in
/// the tree.
///
/// # Examples
///
/// ```
/// use bptree_index::{BPTree, Comparator};
///
/// let mut protein = BPTree::new(3)?;
/// for (grams, food) in [(5, "rice"), (31, "chicken"), (13, "egg"), (31, "tuna")] {
///     protein.insert(grams, food);
/// }
///
/// assert_eq!(protein.range_search(&13, Comparator::Equal), [&"egg"]);
/// assert_eq!(protein.range_search(&13, Comparator::GreaterOrEqual).len(), 3);
/// assert_eq!(protein.range_search(&13, Comparator::LessOrEqual), [&"rice", &"egg"]);
///
/// // Level-by-level dump of the keys, for diagnostics.
/// assert_eq!(protein.to_string(), "{[13, 31]}\n{[5], [13], [31, 31]}\n");
/// # Ok::<(), bptree_index::Error>(())
/// ```
///
/// [total order]: https://en.wikipedia.org/wiki/Total_order
pub struct BPTree<K, V> {
    raw: RawBPTree<K, V>,
}

impl<K, V> BPTree<K, V> {
    /// Creates an empty tree whose nodes split when they reach `branching_factor` keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`](crate::Error::InvalidConfiguration) if
    /// `branching_factor <= 2`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bptree_index::{BPTree, Error};
    ///
    /// assert!(BPTree::<i32, ()>::new(3).is_ok());
    /// assert_eq!(
    ///     BPTree::<i32, ()>::new(2).err(),
    ///     Some(Error::InvalidConfiguration { branching_factor: 2 }),
    /// );
    /// ```
    pub fn new(branching_factor: usize) -> Result<Self> {
        Ok(Self::with_branching_factor(BranchingFactor::new(branching_factor)?))
    }

    /// Creates an empty tree from an already validated branching factor.
    #[must_use]
    pub fn with_branching_factor(branching_factor: BranchingFactor) -> Self {
        tracing::debug!(branching_factor = branching_factor.get(), "created index");
        BPTree {
            raw: RawBPTree::new(branching_factor),
        }
    }

    /// Returns the branching factor the tree was built with.
    #[must_use]
    pub fn branching_factor(&self) -> usize {
        self.raw.branching_factor().get()
    }

    /// Returns the number of entries in the tree, counting duplicate keys separately.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the tree holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.len() == 0
    }

    /// Returns the number of levels in the tree, counting the leaves.
    ///
    /// An empty tree has height 1. The height grows by exactly one each time the root
    /// overflows and splits.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.raw.height()
    }

    /// Gets an iterator over the entries of the tree, in ascending key order.
    ///
    /// The iterator walks the leaf chain: forwards with [`Iterator::next`], backwards with
    /// [`DoubleEndedIterator::next_back`].
    ///
    /// # Examples
    ///
    /// ```
    /// use bptree_index::BPTree;
    ///
    /// let mut tree = BPTree::default();
    /// tree.insert(3, 'c');
    /// tree.insert(1, 'a');
    /// tree.insert(2, 'b');
    ///
    /// let keys: Vec<_> = tree.iter().map(|(k, _)| *k).collect();
    /// assert_eq!(keys, [1, 2, 3]);
    /// assert_eq!(tree.iter().next_back(), Some((&3, &'c')));
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        let back_leaf = self.raw.last_leaf();
        Iter {
            tree: &self.raw,
            front_leaf: Some(self.raw.first_leaf()),
            front_index: 0,
            back_leaf: Some(back_leaf),
            back_index: self.raw.leaf(back_leaf).key_count().saturating_sub(1),
            remaining: self.raw.len(),
        }
    }
}

impl<K: Clone + Ord, V> BPTree<K, V> {
    /// Inserts a key-value pair.
    ///
    /// Always succeeds. An existing equal key is not replaced: both entries are kept and
    /// both are returned by searches for that key.
    pub fn insert(&mut self, key: K, value: V) {
        self.raw.insert(key, value);
    }

    /// Returns the values whose keys satisfy `comparator` against `key`, in ascending key
    /// order.
    ///
    /// # Examples
    ///
    /// ```
    /// use bptree_index::{BPTree, Comparator};
    ///
    /// let mut tree = BPTree::new(3)?;
    /// for key in [5, 3, 8, 1, 4, 7, 2, 6] {
    ///     tree.insert(key, key * 10);
    /// }
    ///
    /// assert_eq!(tree.range_search(&4, Comparator::LessOrEqual), [&10, &20, &30, &40]);
    /// assert_eq!(tree.range_search(&4, Comparator::Equal), [&40]);
    /// # Ok::<(), bptree_index::Error>(())
    /// ```
    pub fn range_search<Q>(&self, key: &Q, comparator: Comparator) -> Vec<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.range_search(key, comparator)
    }

    /// Like [`range_search`](Self::range_search), with the comparator given as its literal
    /// token `"<="`, `"=="` or `">="`.
    ///
    /// Any other token, including the empty string, matches nothing: the result is an
    /// empty vector rather than an error, so rule-by-rule filtering can always intersect
    /// the results it gets back.
    ///
    /// # Examples
    ///
    /// ```
    /// use bptree_index::BPTree;
    ///
    /// let mut tree = BPTree::new(3)?;
    /// tree.insert(150, "oats");
    ///
    /// assert_eq!(tree.range_search_token(&150, ">="), [&"oats"]);
    /// assert!(tree.range_search_token(&150, "bogus").is_empty());
    /// # Ok::<(), bptree_index::Error>(())
    /// ```
    pub fn range_search_token<Q>(&self, key: &Q, token: &str) -> Vec<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        match Comparator::from_token(token) {
            Some(comparator) => self.range_search(key, comparator),
            None => {
                tracing::debug!(token, "unrecognized comparator; matching nothing");
                Vec::new()
            }
        }
    }
}

impl<K, V> Default for BPTree<K, V> {
    /// Creates an empty tree with the minimum branching factor.
    fn default() -> Self {
        Self::with_branching_factor(BranchingFactor::default())
    }
}

impl<K: Clone + Ord, V> Extend<(K, V)> for BPTree<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K, V> IntoIterator for &'a BPTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

/// Renders the keys level by level, one line per level.
///
/// Each parent's children are grouped in braces and each node is rendered as its key
/// list, e.g. `{[5]}` over `{[3], [7]}` over `{[1, 2], [3, 4]}, {[5, 6], [7, 8]}`.
impl<K: fmt::Display, V> fmt::Display for BPTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt_levels(f)
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for BPTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// An iterator over the entries of a `BPTree`, in ascending key order.
///
/// This `struct` is created by the [`iter`] method on [`BPTree`].
///
/// [`iter`]: BPTree::iter
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, K, V> {
    tree: &'a RawBPTree<K, V>,
    front_leaf: Option<Handle>,
    front_index: usize,
    back_leaf: Option<Handle>,
    back_index: usize,
    remaining: usize,
}

impl<'a, K: 'a, V: 'a> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let tree = self.tree;
        let leaf = tree.leaf(self.front_leaf?);
        let key = leaf.key(self.front_index);
        let value = tree.value(leaf.value(self.front_index));

        self.remaining -= 1;
        self.front_index += 1;

        // Move to next leaf if needed
        if self.front_index >= leaf.key_count() {
            self.front_leaf = leaf.next();
            self.front_index = 0;
        }

        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K: 'a, V: 'a> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let tree = self.tree;
        let leaf = tree.leaf(self.back_leaf?);
        let key = leaf.key(self.back_index);
        let value = tree.value(leaf.value(self.back_index));

        self.remaining -= 1;

        // Move to previous element/leaf
        if self.back_index == 0 {
            self.back_leaf = leaf.prev();
            if let Some(prev) = self.back_leaf {
                self.back_index = tree.leaf(prev).key_count().saturating_sub(1);
            }
        } else {
            self.back_index -= 1;
        }

        Some((key, value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter { ..*self }
    }
}

impl<K, V> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("remaining", &self.remaining).finish()
    }
}
