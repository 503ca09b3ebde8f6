//! Virtual source trees.
//!
//! The compiler expects sources laid out by namespace, while a project keeps
//! them wherever it likes. A virtual tree is a directory of symbolic links
//! that presents the declared logical layout without copying any bytes.

use std::fs;
use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::artifact::EXTERNS_FILE;
use crate::error::{Error, Result};
use crate::module::ModuleDecl;
use crate::paths::{BuildDirs, publish};

/// A validated logical-to-physical mapping for one module.
#[derive(Debug, Clone)]
pub struct VirtualTree {
    module: String,
    entries: Vec<(PathBuf, PathBuf)>,
    generated: Vec<(PathBuf, String)>,
}

impl VirtualTree {
    /// Collect and validate the sources, resources and externs of `module`.
    ///
    /// Physical paths are resolved against the project root. When the module
    /// declares externs, an interface descriptor listing them is generated at
    /// the tree root.
    pub fn for_module(module: &ModuleDecl, dirs: &BuildDirs) -> Result<Self> {
        let mut tree = Self {
            module: module.name.clone(),
            entries: Vec::new(),
            generated: Vec::new(),
        };
        let mut seen = FxHashSet::default();

        let mappings = module
            .srcs
            .iter()
            .chain(module.resources.iter())
            .chain(module.externs.iter());
        for (logical, physical) in mappings {
            let logical = tree.check_logical(logical, &mut seen)?;
            tree.entries.push((logical, dirs.resolve(physical)));
        }

        if let Some(descriptor) = module.externs_descriptor() {
            let logical = tree.check_logical(EXTERNS_FILE, &mut seen)?;
            tree.generated.push((logical, descriptor));
        }

        Ok(tree)
    }

    fn check_logical(&self, logical: &str, seen: &mut FxHashSet<PathBuf>) -> Result<PathBuf> {
        let path = Path::new(logical);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if logical.is_empty() || escapes {
            return Err(self.invalid(format!(
                "logical path '{}' must be relative and stay inside the tree",
                logical
            )));
        }

        let normalized: PathBuf = path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        if normalized.as_os_str().is_empty() {
            return Err(self.invalid(format!("logical path '{}' names no file", logical)));
        }
        if !seen.insert(normalized.clone()) {
            return Err(self.invalid(format!(
                "logical path '{}' is declared more than once",
                logical
            )));
        }
        Ok(normalized)
    }

    fn invalid(&self, message: String) -> Error {
        Error::InvalidTree {
            module: self.module.clone(),
            message,
        }
    }

    /// Logical paths in declaration order, generated files last.
    pub fn logical_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .map(|(logical, _)| logical.as_path())
            .chain(self.generated.iter().map(|(logical, _)| logical.as_path()))
    }

    /// Materialise the tree at `out`, replacing any previous tree.
    pub fn assemble(&self, dirs: &BuildDirs, out: &Path) -> Result<()> {
        let staging = dirs.staging("tree-")?;

        for (logical, physical) in &self.entries {
            if !physical.exists() {
                return Err(self.invalid(format!(
                    "'{}' maps to '{}', which does not exist",
                    logical.display(),
                    physical.display()
                )));
            }
            let target = fs::canonicalize(physical)?;
            let link = staging.path().join(logical);
            if let Some(parent) = link.parent() {
                fs::create_dir_all(parent)?;
            }
            link_file(&target, &link)?;
        }

        for (logical, content) in &self.generated {
            fs::write(staging.path().join(logical), content)?;
        }

        publish(staging, out)?;
        tracing::debug!(
            "Assembled tree for {} ({} entries) at {}",
            self.module,
            self.entries.len() + self.generated.len(),
            out.display()
        );
        Ok(())
    }
}

/// Assemble the virtual tree of `module` at its standard location.
pub fn assemble(module: &ModuleDecl, dirs: &BuildDirs) -> Result<PathBuf> {
    let out = dirs.tree_dir(&module.name);
    VirtualTree::for_module(module, dirs)?.assemble(dirs, &out)?;
    Ok(out)
}

#[cfg(unix)]
fn link_file(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_file(target: &Path, link: &Path) -> Result<()> {
    // Symlinks need elevated rights on some platforms.
    fs::copy(target, link)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::FileMap;
    use tempfile::TempDir;

    fn project() -> (TempDir, BuildDirs) {
        let temp = TempDir::new().unwrap();
        let dirs = BuildDirs::create(temp.path()).unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/core.cljs"), "(ns app.core)").unwrap();
        fs::write(temp.path().join("src/logo.svg"), "<svg/>").unwrap();
        (temp, dirs)
    }

    #[test]
    fn test_assemble_links_sources() {
        let (_temp, dirs) = project();
        let module = ModuleDecl::new("app.core")
            .with_srcs(FileMap::new().with("app/core.cljs", "src/core.cljs"))
            .with_resources(FileMap::new().with("public/logo.svg", "src/logo.svg"));

        let out = assemble(&module, &dirs).unwrap();

        let link = out.join("app/core.cljs");
        assert!(fs::symlink_metadata(&link).is_ok());
        assert_eq!(fs::read_to_string(&link).unwrap(), "(ns app.core)");
        assert_eq!(fs::read_to_string(out.join("public/logo.svg")).unwrap(), "<svg/>");
        assert!(!out.join(EXTERNS_FILE).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_no_bytes_copied() {
        let (_temp, dirs) = project();
        let module =
            ModuleDecl::new("app.core").with_srcs(FileMap::new().with("app/core.cljs", "src/core.cljs"));

        let out = assemble(&module, &dirs).unwrap();
        let meta = fs::symlink_metadata(out.join("app/core.cljs")).unwrap();
        assert!(meta.file_type().is_symlink());
    }

    #[test]
    fn test_externs_descriptor_generated() {
        let (temp, dirs) = project();
        fs::write(temp.path().join("src/maps.js"), "var google;").unwrap();
        let module = ModuleDecl::new("app.maps")
            .with_externs(FileMap::new().with("externs/maps.js", "src/maps.js"));

        let out = assemble(&module, &dirs).unwrap();
        assert_eq!(
            fs::read_to_string(out.join(EXTERNS_FILE)).unwrap(),
            "{:externs [\"externs/maps.js\"]}\n"
        );
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let (_temp, dirs) = project();
        for bad in ["../core.cljs", "/etc/passwd", "a/../../b.cljs", ""] {
            let module =
                ModuleDecl::new("app.core").with_srcs(FileMap::new().with(bad, "src/core.cljs"));
            let err = VirtualTree::for_module(&module, &dirs).unwrap_err();
            assert!(matches!(err, Error::InvalidTree { .. }), "accepted '{}'", bad);
        }
    }

    #[test]
    fn test_rejects_duplicate_logical_paths() {
        let (_temp, dirs) = project();
        let module = ModuleDecl::new("app.core")
            .with_srcs(FileMap::new().with("app/core.cljs", "src/core.cljs"))
            .with_resources(FileMap::new().with("./app/core.cljs", "src/logo.svg"));

        let err = VirtualTree::for_module(&module, &dirs).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_missing_source() {
        let (_temp, dirs) = project();
        let module =
            ModuleDecl::new("app.core").with_srcs(FileMap::new().with("app/x.cljs", "src/x.cljs"));

        let err = assemble(&module, &dirs).unwrap_err();
        assert!(matches!(err, Error::InvalidTree { .. }));
    }

    #[test]
    fn test_reassemble_drops_stale_entries() {
        let (_temp, dirs) = project();
        let first = ModuleDecl::new("app.core")
            .with_srcs(FileMap::new().with("app/old.cljs", "src/core.cljs"));
        let out = assemble(&first, &dirs).unwrap();
        assert!(out.join("app/old.cljs").exists());

        let second = ModuleDecl::new("app.core")
            .with_srcs(FileMap::new().with("app/core.cljs", "src/core.cljs"));
        assemble(&second, &dirs).unwrap();
        assert!(!out.join("app/old.cljs").exists());
        assert!(out.join("app/core.cljs").exists());
    }
}
