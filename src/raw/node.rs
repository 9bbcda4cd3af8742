use core::borrow::Borrow;

use smallvec::SmallVec;

use super::handle::Handle;

/// Keys held inline before a node's storage spills to the heap.
///
/// Sized for the small branching factors this index is usually built with; larger factors
/// still work, they just allocate.
pub(crate) const INLINE_KEYS: usize = 8;

pub(crate) enum Node<K> {
    Internal(InternalNode<K>),
    Leaf(LeafNode<K>),
}

// children[i] holds keys in [keys[i - 1], keys[i]]; duplicates may sit on both sides of a
// separator equal to them.
pub(crate) struct InternalNode<K> {
    keys: SmallVec<[K; INLINE_KEYS]>,
    children: SmallVec<[Handle; INLINE_KEYS + 1]>,
}

// Values live in their own arena; a leaf stores their handles alongside the keys.
pub(crate) struct LeafNode<K> {
    prev: Option<Handle>,
    next: Option<Handle>,
    keys: SmallVec<[K; INLINE_KEYS]>,
    values: SmallVec<[Handle; INLINE_KEYS]>,
}

impl<K> Node<K> {
    /// Returns the leaf node, panicking if this is not a leaf.
    pub(crate) fn as_leaf(&self) -> &LeafNode<K> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("expected leaf node"),
        }
    }

    /// Returns the leaf node mutably, panicking if this is not a leaf.
    pub(crate) fn as_leaf_mut(&mut self) -> &mut LeafNode<K> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("expected leaf node"),
        }
    }

    /// Returns the internal node mutably, panicking if this is not internal.
    pub(crate) fn as_internal_mut(&mut self) -> &mut InternalNode<K> {
        match self {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("expected internal node"),
        }
    }

    /// Returns the keys of either variant.
    pub(crate) fn keys(&self) -> &[K] {
        match self {
            Node::Internal(internal) => internal.keys(),
            Node::Leaf(leaf) => leaf.keys(),
        }
    }

    /// Returns the number of keys in this node.
    pub(crate) fn key_count(&self) -> usize {
        self.keys().len()
    }

    /// True once the node holds `branching_factor` keys and must be split.
    #[inline]
    pub(crate) fn is_overflow(&self, branching_factor: usize) -> bool {
        self.key_count() >= branching_factor
    }
}

impl<K> InternalNode<K> {
    /// Creates a root over two children separated by `separator`.
    pub(crate) fn new_root(lower: Handle, separator: K, upper: Handle) -> Self {
        let mut node = Self::new();
        node.keys.push(separator);
        node.children.push(lower);
        node.children.push(upper);
        node
    }

    fn new() -> Self {
        Self {
            keys: SmallVec::new(),
            children: SmallVec::new(),
        }
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    #[inline]
    pub(crate) fn child(&self, index: usize) -> Handle {
        self.children[index]
    }

    pub(crate) fn children(&self) -> &[Handle] {
        &self.children
    }

    /// Index of the first separator `>= key`, or the last child. Ties go left.
    ///
    /// This is the leftmost child that can hold `key`, so insertion, `==` and `>=` all
    /// enter here.
    #[inline]
    pub(crate) fn lower_index<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.keys.partition_point(|k| k.borrow() < key)
    }

    /// Number of separators `<= key`: the rightmost child that can hold `key`.
    #[inline]
    pub(crate) fn upper_index<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.keys.partition_point(|k| k.borrow() <= key)
    }

    /// Records that `children[index]` split off `lower`, its lower half.
    ///
    /// `separator` is the first key of the remaining upper half, which lies between the
    /// separators around `index`, so inserting it at `index` keeps the keys sorted.
    pub(crate) fn insert_child(&mut self, index: usize, separator: K, lower: Handle) {
        self.keys.insert(index, separator);
        self.children.insert(index, lower);
    }

    /// Moves the lower half of an overflowed node into a new sibling and returns it.
    ///
    /// With `n` keys the sibling takes `n / 2` keys and one more child than that; the next
    /// key is dropped because the parent re-derives its separator from the leaves. Both
    /// halves keep `children == keys + 1` whatever the parity of `n`.
    pub(crate) fn split(&mut self) -> InternalNode<K> {
        let mid = self.keys.len() / 2;

        let mut lower = InternalNode::new();
        lower.keys = self.keys.drain(..mid).collect();
        lower.children = self.children.drain(..=mid).collect();
        self.keys.remove(0);

        lower
    }
}

impl<K> LeafNode<K> {
    pub(crate) fn new() -> Self {
        Self {
            prev: None,
            next: None,
            keys: SmallVec::new(),
            values: SmallVec::new(),
        }
    }

    pub(crate) fn prev(&self) -> Option<Handle> {
        self.prev
    }

    pub(crate) fn set_prev(&mut self, prev: Option<Handle>) {
        self.prev = prev;
    }

    pub(crate) fn next(&self) -> Option<Handle> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: Option<Handle>) {
        self.next = next;
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    #[inline]
    pub(crate) fn value(&self, index: usize) -> Handle {
        self.values[index]
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn first_key(&self) -> Option<&K> {
        self.keys.first()
    }

    /// Iterates keys paired with value handles in ascending key order.
    pub(crate) fn entries(&self) -> impl DoubleEndedIterator<Item = (&K, Handle)> {
        self.keys.iter().zip(self.values.iter().copied())
    }

    /// Inserts before the first strictly greater key, so equal keys keep arrival order.
    pub(crate) fn insert(&mut self, key: K, value: Handle)
    where
        K: Ord,
    {
        let index = self.keys.partition_point(|k| *k <= key);
        self.keys.insert(index, key);
        self.values.insert(index, value);
    }

    /// Moves the first `len / 2` pairs into a new, unlinked leaf and returns it.
    ///
    /// The caller splices the new leaf into the chain in front of this one.
    pub(crate) fn split(&mut self) -> LeafNode<K> {
        let mid = self.keys.len() / 2;

        let mut lower = LeafNode::new();
        lower.keys = self.keys.drain(..mid).collect();
        lower.values = self.values.drain(..mid).collect();

        lower
    }
}
