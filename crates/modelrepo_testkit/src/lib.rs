//! # ModelRepo Testkit
//!
//! Test utilities for ModelRepo.
//!
//! This crate provides:
//! - Canned model graphs covering every object kind
//! - Store seeding helpers that write generations row by row
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modelrepo_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_sample() {
//!     let sample = SampleModel::build();
//!     // ... exercise the graph
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
