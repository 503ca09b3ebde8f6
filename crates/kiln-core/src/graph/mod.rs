//! Build graph construction.
//!
//! This module provides:
//! - Node identities keyed by `(module, artifact kind, profile)`
//! - Graph construction from a manifest for the profiles in use
//! - Unresolved-dependency and cycle detection with helpful messages
//! - Topological ordering and levels for parallel execution
//!
//! Per module and profile the graph holds:
//!
//! ```text
//! tree(m) ──────────────┐
//! tree(compile dep) ────┤
//! interface(dep, p) ────┴──► fragment(m, p) ──► interface(m, p)
//!                                  │                  │
//!                                  └──► bundle(m, p) ◄┘◄── bundle(dep, p)
//!                                            │
//!                                            └──► binary(b, p)
//! ```

mod engine;
mod types;

pub use engine::BuildGraph;
pub use types::{NodeKey, NodeKind};
