//! # DocSync Testkit
//!
//! Test utilities for DocSync.
//!
//! This crate provides:
//! - Document fixtures and backends wired to in-memory drivers
//! - Property-based test generators using proptest
//! - Contract checks that every backend must pass
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docsync_testkit::prelude::*;
//!
//! #[test]
//! fn drop_is_idempotent_everywhere() {
//!     for mut backend in TestBackend::all() {
//!         contract::test_drop_absent_target(&mut *backend);
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod contract;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::contract;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
