//! Build directory management.
//!
//! Provides a consistent directory structure for Kiln projects,
//! so the plan, the executor and the CLI agree on every output location.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;
use crate::profile::Profile;

/// Directory structure for a Kiln project.
///
/// All Kiln-related files are stored under a `.kiln` directory next to the
/// project manifest:
///
/// ```text
/// kiln.toml
/// .kiln/
/// ├── out/
/// │   ├── tree/<module>/                 # virtual source trees
/// │   ├── bin/<profile>/<binary>/        # deployable output
/// │   └── <profile>/
/// │       ├── <module>/fragment/         # compiler output
/// │       ├── <module>/interface/        # public surface
/// │       └── <module>/bundle/           # transitive merge
/// ├── cache/      # action cache
/// └── tmp/        # scratch and staging directories
/// ```
#[derive(Debug, Clone)]
pub struct BuildDirs {
    /// Project root (directory containing `kiln.toml`).
    pub root: PathBuf,

    /// The `.kiln` directory itself.
    pub kiln_dir: PathBuf,

    /// Output directory for all artifacts.
    pub out_dir: PathBuf,

    /// Cache directory for action metadata.
    pub cache_dir: PathBuf,

    /// Scratch directory for compiler invocations and staging.
    pub tmp_dir: PathBuf,
}

impl BuildDirs {
    /// Describe the directory structure for a project root without touching
    /// the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let kiln_dir = root.join(".kiln");
        Self {
            out_dir: kiln_dir.join("out"),
            cache_dir: kiln_dir.join("cache"),
            tmp_dir: kiln_dir.join("tmp"),
            kiln_dir,
            root,
        }
    }

    /// Create the directory structure if it does not exist.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let dirs = Self::new(root);
        fs::create_dir_all(&dirs.out_dir)?;
        fs::create_dir_all(&dirs.cache_dir)?;
        fs::create_dir_all(&dirs.tmp_dir)?;
        Ok(dirs)
    }

    /// Resolve a path declared in the manifest against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn tree_dir(&self, module: &str) -> PathBuf {
        self.out_dir.join("tree").join(module)
    }

    pub fn fragment_dir(&self, module: &str, profile: Profile) -> PathBuf {
        self.module_dir(module, profile).join("fragment")
    }

    pub fn interface_dir(&self, module: &str, profile: Profile) -> PathBuf {
        self.module_dir(module, profile).join("interface")
    }

    pub fn bundle_dir(&self, module: &str, profile: Profile) -> PathBuf {
        self.module_dir(module, profile).join("bundle")
    }

    /// Kept apart from the per-profile module directories, which any module
    /// name may occupy.
    pub fn binary_dir(&self, binary: &str, profile: Profile) -> PathBuf {
        self.out_dir.join("bin").join(profile.name()).join(binary)
    }

    /// Path of the action cache file.
    pub fn action_cache_path(&self) -> PathBuf {
        self.cache_dir.join("actions.json")
    }

    /// A fresh staging directory under `tmp/`, removed on drop unless it
    /// is published.
    pub fn staging(&self, prefix: &str) -> Result<TempDir> {
        fs::create_dir_all(&self.tmp_dir)?;
        Ok(tempfile::Builder::new().prefix(prefix).tempdir_in(&self.tmp_dir)?)
    }

    fn module_dir(&self, module: &str, profile: Profile) -> PathBuf {
        self.out_dir.join(profile.name()).join(module)
    }

    /// Clean all build artifacts.
    ///
    /// Removes the entire `.kiln` directory.
    pub fn clean(&self) -> Result<()> {
        if self.kiln_dir.exists() {
            fs::remove_dir_all(&self.kiln_dir)?;
        }
        Ok(())
    }
}

/// Move a finished staging directory to its final location, replacing any
/// previous artifact there.
pub fn publish(staging: TempDir, out: &Path) -> Result<()> {
    if out.exists() {
        fs::remove_dir_all(out)?;
    }
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(staging.path(), out)?;
    // Dropping the handle now finds nothing left to remove.
    drop(staging);
    Ok(())
}
