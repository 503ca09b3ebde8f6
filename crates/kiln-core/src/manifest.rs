//! Project manifest (`kiln.toml`).
//!
//! ```toml
//! [build]
//! runner = "standalone"
//! implicit_deps = ["clojurescript"]
//!
//! [[module]]
//! name = "app.core"
//! srcs = { "app/core.cljs" = "src/app/core.cljs" }
//! deps = ["app.util"]
//!
//! [[binary]]
//! name = "app"
//! main = "app.core"
//! module = "app.core"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::module::{BinaryDecl, ModuleDecl};

/// Manifest file name.
pub const MANIFEST_FILE: &str = "kiln.toml";

/// Parsed and validated project manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleDecl>,

    #[serde(default, rename = "binary")]
    pub binaries: Vec<BinaryDecl>,
}

impl Manifest {
    /// Parse and validate manifest text.
    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text).map_err(|e| Error::Manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Manifest(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Find the nearest `kiln.toml` in `start` or one of its ancestors.
    ///
    /// Returns the project root together with the manifest.
    pub fn discover(start: &Path) -> Result<(PathBuf, Self)> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(MANIFEST_FILE);
            if candidate.is_file() {
                let manifest = Self::load(&candidate)?;
                return Ok((current, manifest));
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => {
                    return Err(Error::Manifest(format!(
                        "no {} found in {} or any parent directory",
                        MANIFEST_FILE,
                        start.display()
                    )));
                }
            }
        }
    }

    /// Check names: unique, and usable as directory names.
    pub fn validate(&self) -> Result<()> {
        let mut modules = FxHashSet::default();
        for module in &self.modules {
            check_name(&module.name)?;
            if !modules.insert(module.name.as_str()) {
                return Err(Error::DuplicateModule(module.name.clone()));
            }
        }

        let mut binaries = FxHashSet::default();
        for binary in &self.binaries {
            check_name(&binary.name)?;
            if !binaries.insert(binary.name.as_str()) {
                return Err(Error::DuplicateModule(binary.name.clone()));
            }
            if binary.main.trim().is_empty() {
                return Err(Error::Manifest(format!(
                    "binary '{}' has an empty main namespace",
                    binary.name
                )));
            }
        }
        Ok(())
    }

    pub fn module(&self, name: &str) -> Option<&ModuleDecl> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn binary(&self, name: &str) -> Option<&BinaryDecl> {
        self.binaries.iter().find(|b| b.name == name)
    }
}

fn check_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(Error::Manifest(format!(
            "invalid name '{}': use letters, digits, '.', '-' or '_'",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerKind;
    use crate::profile::Profile;

    const SAMPLE: &str = r#"
[build]
runner = "worker"
implicit_deps = ["cljs"]

[[module]]
name = "cljs"
bootstrap = true

[[module]]
name = "app.util"
srcs = ["app/util.cljs"]

[[module]]
name = "app.core"
srcs = { "app/core.cljs" = "src/core.cljs" }
deps = ["app.util"]
compiler_options = { ":pretty-print" = true }

[[binary]]
name = "app"
main = "app.core"
module = "app.core"
profile = "whitespace"
"#;

    #[test]
    fn test_parse_sample() {
        let manifest = Manifest::parse(SAMPLE).unwrap();

        assert_eq!(manifest.build.runner, RunnerKind::Worker);
        assert_eq!(manifest.modules.len(), 3);
        assert!(manifest.module("cljs").unwrap().bootstrap);
        assert_eq!(manifest.module("app.core").unwrap().deps, vec!["app.util"]);

        let binary = manifest.binary("app").unwrap();
        assert_eq!(binary.profile, Profile::Whitespace);
        assert_eq!(binary.output_name(), "app");
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = Manifest::parse("").unwrap();
        assert!(manifest.modules.is_empty());
        assert!(manifest.build.compilation_enabled);
    }

    #[test]
    fn test_duplicate_module() {
        let text = "[[module]]\nname = \"a\"\n[[module]]\nname = \"a\"\n";
        let err = Manifest::parse(text).unwrap_err();
        assert!(matches!(err, Error::DuplicateModule(name) if name == "a"));
    }

    #[test]
    fn test_invalid_name() {
        let text = "[[module]]\nname = \"../escape\"\n";
        assert!(matches!(Manifest::parse(text), Err(Error::Manifest(_))));
    }

    #[test]
    fn test_unknown_profile_in_binary() {
        let text = r#"
[[binary]]
name = "app"
main = "app.core"
module = "app.core"
profile = "fast"
"#;
        let err = Manifest::parse(text).unwrap_err();
        assert!(err.to_string().contains("unknown profile 'fast'"));
    }

    #[test]
    fn test_discover_walks_up() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), SAMPLE).unwrap();
        let nested = temp.path().join("src/app");
        fs::create_dir_all(&nested).unwrap();

        let (root, manifest) = Manifest::discover(&nested).unwrap();
        assert_eq!(root, temp.path());
        assert_eq!(manifest.modules.len(), 3);
    }
}
