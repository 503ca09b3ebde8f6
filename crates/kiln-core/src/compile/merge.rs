//! Transitive merge.
//!
//! A module's bundle is the union of its own fragment and every dependency
//! bundle, so each bundle holds everything needed to run the module. The
//! first writer of a path wins; a later writer must carry identical bytes.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use walkdir::WalkDir;

use crate::artifact::{
    CompiledFragment, InterfaceArtifact, NamespaceSet, TRANSITIVE_MANIFEST_FILE, TransitiveBundle,
    is_reserved,
};
use crate::error::{Error, Result};
use crate::paths::{BuildDirs, publish};
use crate::profile::Profile;

/// Merge `fragment` with its interface and the dependency bundles, in
/// dependency order.
///
/// Control files are never copied from inputs: the own interface files are
/// placed at the bundle root and the compiled namespace set is recomputed as
/// the union of the fragment's and every dependency bundle's set.
pub fn merge(
    fragment: &CompiledFragment,
    interface: &InterfaceArtifact,
    deps: &[TransitiveBundle],
    dirs: &BuildDirs,
) -> Result<TransitiveBundle> {
    let profile = fragment.profile;
    check_profile(&interface.module, profile, interface.profile)?;
    for dep in deps {
        check_profile(&dep.module, profile, dep.profile)?;
    }

    let staging = dirs.staging("bundle-")?;
    let mut merger = Merger {
        root: staging.path(),
        owners: FxHashMap::default(),
    };

    for dep in deps {
        merger.copy_tree(&dep.dir, &dep.module)?;
    }
    merger.copy_tree(&fragment.dir, &fragment.module)?;

    // The own public surface travels with the bundle.
    for entry in fs::read_dir(&interface.dir)? {
        let entry = entry?;
        if entry.path().is_file() {
            fs::copy(entry.path(), staging.path().join(entry.file_name()))?;
        }
    }

    let mut namespaces = fragment.namespaces()?;
    for dep in deps {
        namespaces.extend(dep.namespaces()?);
    }
    namespaces.write(&staging.path().join(TRANSITIVE_MANIFEST_FILE))?;

    let files = merger.owners.len();
    let out = dirs.bundle_dir(&fragment.module, profile);
    publish(staging, &out)?;
    tracing::debug!(
        "Merged {} [{}]: {} files, {} namespaces",
        fragment.module,
        profile,
        files,
        namespaces.len()
    );
    Ok(TransitiveBundle::new(&fragment.module, profile, out))
}

/// Bundle of a bootstrap module: an empty compiled namespace set only.
pub fn bootstrap_bundle(module: &str, profile: Profile, dirs: &BuildDirs) -> Result<TransitiveBundle> {
    let staging = dirs.staging("bundle-")?;
    NamespaceSet::new().write(&staging.path().join(TRANSITIVE_MANIFEST_FILE))?;

    let out = dirs.bundle_dir(module, profile);
    publish(staging, &out)?;
    Ok(TransitiveBundle::new(module, profile, out))
}

fn check_profile(module: &str, expected: Profile, found: Profile) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::ProfileMismatch {
            module: module.to_string(),
            expected,
            found,
        })
    }
}

struct Merger<'a> {
    root: &'a Path,
    /// Relative path -> module that first wrote it.
    owners: FxHashMap<PathBuf, String>,
}

impl Merger<'_> {
    fn copy_tree(&mut self, src: &Path, module: &str) -> Result<()> {
        for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .map_err(|_| Error::MissingArtifact(entry.path().to_path_buf()))?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            let dest = self.root.join(relative);
            if entry.file_type().is_dir() {
                if dest.exists() && !dest.is_dir() {
                    return Err(self.collision(relative, module));
                }
                fs::create_dir_all(&dest)?;
                continue;
            }
            if is_reserved(relative) {
                continue;
            }

            if dest.exists() {
                if dest.is_file() && fs::read(&dest)? == fs::read(entry.path())? {
                    tracing::trace!("{} already present, skipping", relative.display());
                    continue;
                }
                return Err(self.collision(relative, module));
            }

            fs::copy(entry.path(), &dest)?;
            self.owners.insert(relative.to_path_buf(), module.to_string());
        }
        Ok(())
    }

    /// `module` clashes with whatever an earlier input wrote at `relative`.
    fn collision(&self, relative: &Path, module: &str) -> Error {
        Error::ArtifactCollision {
            path: relative.to_path_buf(),
            first: self.owner_of(relative),
            second: module.to_string(),
        }
    }

    /// Owner of `relative`, or of the first file written beneath it when
    /// `relative` is a directory.
    fn owner_of(&self, relative: &Path) -> String {
        if let Some(owner) = self.owners.get(relative) {
            return owner.clone();
        }
        self.owners
            .iter()
            .filter(|(path, _)| path.starts_with(relative))
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(_, owner)| owner.clone())
            .unwrap_or_default()
    }
}
