//! Common test infrastructure
//!
//! Builds export archives in temporary directories and provides a
//! deterministic catalog client. Tests should only import from this module.

mod constants;
mod fake_catalog;
mod fixtures;

#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fake_catalog::FakeCatalog;
#[allow(unused_imports)]
pub use fixtures::{query_pairs, query_strings, sample_export_entries, TestExport};
