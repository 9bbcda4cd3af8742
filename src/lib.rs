//! In-memory B+ tree secondary index for Rust.
//!
//! This crate provides [`BPTree`], a multi-way search tree mapping an ordered key to
//! associated values, with three-way range queries against the key:
//!
//! - [`Comparator::LessOrEqual`] (`"<="`) - every value whose key is at most the target
//! - [`Comparator::Equal`] (`"=="`) - every value whose key equals the target
//! - [`Comparator::GreaterOrEqual`] (`">="`) - every value whose key is at least the target
//!
//! Duplicate keys are allowed; each insertion is stored separately. A typical use is one
//! tree per indexed attribute of a record collection, intersecting the per-rule results
//! outside the tree.
//!
//! # Example
//!
//! ```
//! use bptree_index::{BPTree, Comparator};
//!
//! let mut calories = BPTree::new(3)?;
//! calories.insert(120, "apple");
//! calories.insert(90, "banana");
//! calories.insert(250, "bagel");
//!
//! let light: Vec<_> = calories.range_search(&120, Comparator::LessOrEqual);
//! assert_eq!(light, [&"banana", &"apple"]);
//!
//! // The legacy string interface never fails: unknown tokens match nothing.
//! assert!(calories.range_search_token(&120, "<").is_empty());
//! # Ok::<(), bptree_index::Error>(())
//! ```
//!
//! # Implementation
//!
//! Nodes live in an arena and refer to each other by handle. Internal nodes own their
//! children; leaves are additionally threaded into a doubly linked chain in key order, so
//! open-ended queries descend once to an entry leaf and then walk the chain.

#![no_std]
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod comparator;
mod config;
mod error;
mod raw;

pub mod bptree;

pub use bptree::BPTree;
pub use comparator::Comparator;
pub use config::BranchingFactor;
pub use error::{Error, Result};
