// src/catalog/mod.rs

//! Catalog synchronization building blocks
//!
//! - [`categories`]: category overlay parsing and the shared overlay cache
//! - [`merge`]: additive merge of index entries into Application records

pub mod categories;
pub mod merge;

pub use categories::{
    CategoryCache, CategoryMap, DEFAULT_CATEGORIES_NAME, DEFAULT_CATEGORIES_NAMESPACE,
    parse_categories,
};
pub use merge::{MergeOutcome, merge_application};
