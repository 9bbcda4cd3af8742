use crate::error::{Error, Result};

/// The maximum number of keys a node may hold before it must split.
///
/// A node whose key count reaches the branching factor overflows and is split on the way
/// back up from an insertion, so at rest every node holds fewer keys than this.
///
/// # Examples
///
/// ```
/// use bptree_index::BranchingFactor;
///
/// let factor = BranchingFactor::new(4)?;
/// assert_eq!(factor.get(), 4);
///
/// assert!(BranchingFactor::new(2).is_err());
/// assert_eq!(BranchingFactor::default().get(), BranchingFactor::MIN);
/// # Ok::<(), bptree_index::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BranchingFactor(usize);

impl BranchingFactor {
    /// The smallest branching factor that still splits into two non-trivial halves.
    pub const MIN: usize = 3;

    /// Validates `branching_factor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `branching_factor <= 2`.
    pub fn new(branching_factor: usize) -> Result<Self> {
        if branching_factor < Self::MIN {
            return Err(Error::InvalidConfiguration { branching_factor });
        }
        Ok(Self(branching_factor))
    }

    /// Returns the branching factor as a plain count.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl Default for BranchingFactor {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<usize> for BranchingFactor {
    type Error = Error;

    fn try_from(branching_factor: usize) -> Result<Self> {
        Self::new(branching_factor)
    }
}

impl From<BranchingFactor> for usize {
    fn from(factor: BranchingFactor) -> Self {
        factor.get()
    }
}
