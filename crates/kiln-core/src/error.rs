//! Error types for kiln-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::profile::Profile;

/// Result type for kiln-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kiln-core.
///
/// Every failure is a deterministic function of the build inputs, so nothing
/// in this crate retries.
#[derive(Debug, Error)]
pub enum Error {
    /// Profile name outside the fixed registry.
    #[error("unknown profile '{0}' (expected one of: none, whitespace, advanced)")]
    UnknownProfile(String),

    /// The external compiler exited non-zero.
    #[error("compilation of '{module}' failed under profile '{profile}':\n{diagnostics}")]
    CompileFailed {
        module: String,
        profile: Profile,
        diagnostics: String,
    },

    /// A dependency is not declared, or its artifact is not available.
    #[error("module '{module}' depends on '{dependency}', which could not be resolved")]
    UnresolvedDependency { module: String, dependency: String },

    /// Two inputs of a merge carry different bytes at the same relative path.
    #[error(
        "artifact collision at '{}': '{first}' and '{second}' provide different content",
        path.display()
    )]
    ArtifactCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    /// Cyclic dependency detected in the module graph.
    #[error("cyclic dependency detected: {0}")]
    CyclicDependency(String),

    /// Artifacts compiled under different profiles were combined.
    #[error("'{module}' was built under profile '{found}' but the merge expects '{expected}'")]
    ProfileMismatch {
        module: String,
        expected: Profile,
        found: Profile,
    },

    /// A module or binary name was declared twice.
    #[error("duplicate declaration of '{0}'")]
    DuplicateModule(String),

    /// A virtual tree mapping is malformed.
    #[error("invalid source tree for '{module}': {message}")]
    InvalidTree { module: String, message: String },

    /// An artifact that must exist was not found.
    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Project manifest could not be read or is invalid.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Compiler runner could not be located or started.
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// The executor itself failed (a worker thread panicked).
    #[error("execution error: {0}")]
    Execution(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// A short recovery hint for errors a user can act on.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownProfile(_) => Some("use one of the built-in profiles: none, whitespace, advanced"),
            Self::UnresolvedDependency { .. } => {
                Some("declare the dependency as a [[module]] in kiln.toml or fix its name")
            }
            Self::ArtifactCollision { .. } => {
                Some("two modules emit the same output path; rename one of the namespaces")
            }
            Self::CyclicDependency(_) => Some("break the cycle by moving shared code into its own module"),
            Self::Toolchain(_) => Some("check the [build] runner settings or the KILN_COMPILER_TYPE variable"),
            _ => None,
        }
    }

    /// Render the error followed by its hint, if any.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}
