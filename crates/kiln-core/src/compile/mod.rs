//! Compilation pipeline.
//!
//! This module provides:
//! - Module compilation (virtual tree + dependency interfaces -> fragment)
//! - Interface extraction (fragment -> public surface)
//! - Transitive merges (fragment + dependency bundles -> bundle)
//! - Final bundle emission (bundle -> deployable output)
//!
//! # Architecture
//!
//! ```text
//! tree ──► Compiler::compile ──► fragment ──► extract ──► interface ──► dependents' compiles
//!                                    │                        │
//!                                    └────────► merge ◄───────┘◄── dependency bundles
//!                                                 │
//!                                                 └──► Compiler::emit_binary ──► bin/<binary>
//! ```

mod bundle;
mod interface;
mod merge;
mod module;
mod runner;

pub use interface::{bootstrap_interface, extract};
pub use merge::{bootstrap_bundle, merge};
pub use module::Compiler;
pub use runner::{Invocation, resolve_program};

use crate::error::{Error, Result};
use crate::profile::Profile;

/// Run a compiler invocation to completion.
///
/// A non-zero exit becomes [`Error::CompileFailed`] carrying everything the
/// process printed, stdout first.
fn run(invocation: &Invocation, unit: &str, profile: Profile) -> Result<()> {
    tracing::debug!("Running: {}", invocation.shell_line());

    let output = invocation.to_command()?.output().map_err(|e| {
        Error::Toolchain(format!(
            "failed to start {}: {}",
            invocation.program.display(),
            e
        ))
    })?;

    if output.status.success() {
        return Ok(());
    }

    let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
    diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
    Err(Error::CompileFailed {
        module: unit.to_string(),
        profile,
        diagnostics,
    })
}
