//! Build execution.
//!
//! This module provides:
//! - A content-keyed action cache persisted between builds
//! - A level-parallel executor that brings every graph node up to date
//!
//! A task is skipped when everything it reads hashes the same as last time
//! and its output is untouched. Since dependents read interface artifacts,
//! a change that keeps a module's public surface identical does not
//! recompile anything downstream of it.

mod cache;
mod executor;

pub use cache::{ActionCache, CACHE_VERSION, CacheEntry};
pub use executor::{BuildReport, Executor, Outcome};
