use alloc::string::String;

use thiserror::Error;

/// Result type for index operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by [`BPTree`](crate::BPTree) and its configuration types.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Error {
    /// The branching factor leaves no room for a meaningful split.
    #[error("illegal branching factor: {branching_factor} (must be greater than 2)")]
    InvalidConfiguration {
        /// The rejected branching factor.
        branching_factor: usize,
    },

    /// A comparator token other than `<=`, `==` or `>=`.
    #[error("unknown comparator token: {token:?}")]
    UnknownComparator {
        /// The rejected token.
        token: String,
    },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn messages_name_the_offending_input() {
        let err = Error::InvalidConfiguration { branching_factor: 2 };
        assert_eq!(err.to_string(), "illegal branching factor: 2 (must be greater than 2)");

        let err = Error::UnknownComparator { token: "<".into() };
        assert_eq!(err.to_string(), "unknown comparator token: \"<\"");
    }
}
