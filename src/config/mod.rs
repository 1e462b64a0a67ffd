//! Configuration module for tagwalk
//!
//! This module handles the immutable run parameters and the JSON
//! configuration store (word lists, exclusion rules, page actions).

mod parser;
mod types;
mod validation;

pub use parser::{compute_store_hash, load_store, load_store_with_hash};
pub use types::{
    ActionSpec, CrawlConfig, ExclusionRule, InputSpec, RuleKind, Store, TimingProfile, ValueSource,
};
pub use validation::validate;
