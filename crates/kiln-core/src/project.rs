//! Project loading.
//!
//! Ties a discovered manifest to its build directories and resolved
//! configuration, and hands out graphs, plans and executors for it.

use std::path::{Path, PathBuf};

use crate::compile::Compiler;
use crate::config::BuildConfig;
use crate::error::Result;
use crate::execute::Executor;
use crate::graph::{BuildGraph, NodeKey};
use crate::manifest::Manifest;
use crate::paths::BuildDirs;
use crate::plan::BuildPlan;

/// A loaded kiln project.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory holding `kiln.toml`.
    pub root: PathBuf,
    pub dirs: BuildDirs,
    pub manifest: Manifest,
    /// `[build]` settings resolved against the root, with environment
    /// overrides applied.
    pub config: BuildConfig,
}

impl Project {
    /// Find and load the project containing `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let (root, manifest) = Manifest::discover(dir)?;
        let dirs = BuildDirs::create(&root)?;
        let config = manifest.build.clone().resolved(&dirs).with_env_overrides()?;
        tracing::debug!(
            "Opened project at {} ({} modules, {} binaries)",
            root.display(),
            manifest.modules.len(),
            manifest.binaries.len()
        );
        Ok(Self {
            root,
            dirs,
            manifest,
            config,
        })
    }

    /// Replace the resolved configuration, e.g. with command-line overrides.
    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    pub fn graph(&self) -> Result<BuildGraph> {
        BuildGraph::build(&self.manifest, &self.config)
    }

    pub fn compiler(&self) -> Compiler {
        Compiler::new(self.config.clone(), self.dirs.clone())
    }

    /// Task plan for the whole project.
    pub fn plan(&self) -> Result<BuildPlan> {
        BuildPlan::new(&self.graph()?, &self.compiler())
    }

    /// Executor for the whole project.
    pub fn executor(&self) -> Result<Executor> {
        Ok(Executor::new(self.graph()?, self.compiler()))
    }

    /// Executor limited to `targets` and what they transitively need.
    pub fn executor_for(&self, targets: &[NodeKey]) -> Result<Executor> {
        let graph = self.graph()?.closure(targets)?;
        Ok(Executor::new(graph, self.compiler()))
    }

    /// Executor limited to one binary.
    pub fn binary_executor(&self, name: &str) -> Result<Executor> {
        let graph = self.graph()?;
        let target = graph.binary_target(name)?;
        Ok(Executor::new(graph.closure(&[target])?, self.compiler()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[build]
compile_script = "tools/compile.clj"

[[module]]
name = "app.core"
srcs = ["app/core.cljs"]

[[binary]]
name = "app"
main = "app.core"
module = "app.core"
"#;

    #[test]
    fn test_open_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("kiln.toml"), MANIFEST).unwrap();
        fs::create_dir_all(temp.path().join("app")).unwrap();

        let project = Project::open(&temp.path().join("app")).unwrap();
        assert_eq!(project.root, temp.path());
        assert_eq!(project.config.compile_script, temp.path().join("tools/compile.clj"));
        assert!(temp.path().join(".kiln").is_dir());
    }

    #[test]
    fn test_binary_executor_is_limited_to_target() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("kiln.toml"),
            format!("{}\n[[module]]\nname = \"unrelated\"\n", MANIFEST),
        )
        .unwrap();

        let project = Project::open(temp.path()).unwrap();
        let executor = project.binary_executor("app").unwrap();
        assert!(executor.graph().contains(&NodeKey::bundle("app.core", crate::Profile::Advanced)));
        assert!(!executor.graph().contains(&NodeKey::tree("unrelated")));
    }

    #[test]
    fn test_unknown_binary() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("kiln.toml"), MANIFEST).unwrap();
        let project = Project::open(temp.path()).unwrap();
        assert!(project.binary_executor("nope").is_err());
    }
}
