//! CLI command implementations.

pub mod apply_diff;
pub mod inspect;
pub mod load;
pub mod trim;
