//! Build artifacts and their on-disk layout.
//!
//! Every artifact is a directory. A handful of file names inside it are
//! reserved by the compiler's conventions:
//!
//! ```text
//! fragment/
//! ├── deps.cljs               # interface descriptor (externs)
//! ├── all-namespaces.edn.gz   # public namespace registry
//! ├── ijavascript.edn.gz      # compiled namespace set, aggregated by merges
//! └── ...                     # compiler output
//! ```

mod digest;
mod namespaces;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::profile::Profile;

pub use digest::{ArtifactDigest, digest_dir};
pub use namespaces::NamespaceSet;

/// Interface descriptor listing externs and foreign dependencies.
pub const EXTERNS_FILE: &str = "deps.cljs";

/// Prefix shared by the public namespace registry files.
pub const NAMESPACES_PREFIX: &str = "all-namespaces";

/// File name used when the namespace registry is synthesised.
pub const NAMESPACES_FILE: &str = "all-namespaces.edn.gz";

/// Compiled namespace set; the only manifest aggregated by merges.
pub const TRANSITIVE_MANIFEST_FILE: &str = "ijavascript.edn.gz";

/// Whether a path relative to an artifact root names a control file that
/// merges recompute instead of copying.
pub fn is_reserved(relative: &Path) -> bool {
    // Control files only live at the artifact root.
    if relative.components().count() != 1 {
        return false;
    }
    let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name == EXTERNS_FILE || name == TRANSITIVE_MANIFEST_FILE || is_interface_file(name)
}

/// Whether a root-level file name belongs in an interface artifact.
pub fn is_interface_file(name: &str) -> bool {
    name == EXTERNS_FILE || name.starts_with(NAMESPACES_PREFIX)
}

/// One module's compiler output under one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledFragment {
    pub module: String,
    pub profile: Profile,
    pub dir: PathBuf,
}

impl CompiledFragment {
    pub fn new(module: impl Into<String>, profile: Profile, dir: impl Into<PathBuf>) -> Self {
        Self {
            module: module.into(),
            profile,
            dir: dir.into(),
        }
    }

    /// The fragment's compiled namespace set.
    pub fn namespaces(&self) -> crate::Result<NamespaceSet> {
        NamespaceSet::read_or_empty(&self.dir.join(TRANSITIVE_MANIFEST_FILE))
    }
}

/// Public surface of a fragment: descriptor and namespace registry only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceArtifact {
    pub module: String,
    pub profile: Profile,
    pub dir: PathBuf,
    /// Content digest; identical public surfaces yield identical digests.
    pub digest: ArtifactDigest,
}

impl InterfaceArtifact {
    /// Describe a finalised interface directory, digesting its content.
    pub fn open(module: impl Into<String>, profile: Profile, dir: impl Into<PathBuf>) -> crate::Result<Self> {
        let dir = dir.into();
        let digest = digest_dir(&dir)?;
        Ok(Self {
            module: module.into(),
            profile,
            dir,
            digest,
        })
    }
}

/// A module's fragment merged with every dependency's bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitiveBundle {
    pub module: String,
    pub profile: Profile,
    pub dir: PathBuf,
}

impl TransitiveBundle {
    pub fn new(module: impl Into<String>, profile: Profile, dir: impl Into<PathBuf>) -> Self {
        Self {
            module: module.into(),
            profile,
            dir: dir.into(),
        }
    }

    /// The bundle's aggregated namespace set.
    pub fn namespaces(&self) -> crate::Result<NamespaceSet> {
        NamespaceSet::read_or_empty(&self.dir.join(TRANSITIVE_MANIFEST_FILE))
    }
}
