use core::fmt;
use core::str::FromStr;

use crate::error::Error;

/// The direction of a range search relative to its target key.
///
/// # Examples
///
/// ```
/// use bptree_index::Comparator;
///
/// let comparator: Comparator = ">=".parse()?;
/// assert_eq!(comparator, Comparator::GreaterOrEqual);
/// assert_eq!(Comparator::from_token("=>"), None);
/// # Ok::<(), bptree_index::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Comparator {
    /// `<=`: keys at most the target.
    LessOrEqual,
    /// `==`: keys equal to the target.
    Equal,
    /// `>=`: keys at least the target.
    GreaterOrEqual,
}

impl Comparator {
    /// Parses one of the literal tokens `"<="`, `"=="` or `">="`.
    ///
    /// No trimming or case folding is applied.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<=" => Some(Self::LessOrEqual),
            "==" => Some(Self::Equal),
            ">=" => Some(Self::GreaterOrEqual),
            _ => None,
        }
    }

    /// Returns the literal token for this comparator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::GreaterOrEqual => ">=",
        }
    }
}

impl FromStr for Comparator {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::from_token(token).ok_or_else(|| Error::UnknownComparator { token: token.into() })
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
