//! Core engine for the Kiln build tool.
//!
//! This crate provides:
//! - Profile registry and compiler-option encoding
//! - Virtual source tree assembly
//! - Module compilation, interface extraction and transitive merges
//! - Final bundle emission
//! - A profile-aware build graph, task plan and level-parallel executor
//!   with a content-keyed action cache

pub mod artifact;
pub mod compile;
pub mod config;
pub mod error;
pub mod execute;
pub mod graph;
pub mod manifest;
pub mod module;
pub mod options;
pub mod paths;
pub mod plan;
pub mod profile;
pub mod project;
pub mod tree;

pub use artifact::{ArtifactDigest, CompiledFragment, InterfaceArtifact, NamespaceSet, TransitiveBundle};
pub use compile::{Compiler, Invocation};
pub use config::{BuildConfig, RunnerKind};
pub use error::{Error, Result};
pub use execute::{ActionCache, BuildReport, Executor, Outcome};
pub use graph::{BuildGraph, NodeKey, NodeKind};
pub use manifest::Manifest;
pub use module::{BinaryDecl, FileMap, ModuleDecl};
pub use options::{ConfigValue, encode};
pub use paths::BuildDirs;
pub use plan::{BuildPlan, PlanTask};
pub use profile::Profile;
pub use project::Project;
pub use tree::VirtualTree;
