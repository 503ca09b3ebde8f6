//! Module compiler.
//!
//! Compiles one module under one profile against its virtual tree and the
//! interface artifacts of its dependencies.

use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::{
    CompiledFragment, EXTERNS_FILE, InterfaceArtifact, NAMESPACES_FILE, NamespaceSet,
    TRANSITIVE_MANIFEST_FILE, is_interface_file,
};
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::module::ModuleDecl;
use crate::options::{ConfigValue, encode};
use crate::paths::{BuildDirs, publish};
use crate::profile::Profile;

use super::runner::Invocation;

/// Drives the external compiler for modules and binaries.
#[derive(Debug, Clone)]
pub struct Compiler {
    config: BuildConfig,
    dirs: BuildDirs,
}

impl Compiler {
    /// Create a compiler for a project.
    pub fn new(config: BuildConfig, dirs: BuildDirs) -> Self {
        Self { config, dirs }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn dirs(&self) -> &BuildDirs {
        &self.dirs
    }

    /// Profile options merged with the module's own overrides.
    pub fn module_options(&self, module: &ModuleDecl, profile: Profile) -> ConfigValue {
        profile.config(&module.compiler_options)
    }

    /// Command line for compiling `module`.
    ///
    /// Arguments: compile script, encoded options, output directory, source
    /// tree, then one interface directory per dependency in order. The
    /// classpath holds the tree, a scratch directory, the trees of
    /// compile-only dependencies and the configured compiler classpath.
    pub fn module_invocation(
        &self,
        module: &ModuleDecl,
        profile: Profile,
        scratch: &Path,
        out: &Path,
        dependency_dirs: &[PathBuf],
    ) -> Invocation {
        let tree = self.dirs.tree_dir(&module.name);

        let mut classpath = vec![tree.clone(), scratch.to_path_buf()];
        classpath.extend(module.compile_deps.iter().map(|dep| self.dirs.tree_dir(dep)));
        classpath.extend(self.config.classpath.iter().cloned());

        let mut invocation = Invocation::for_runner(self.config.runner, &self.config, &classpath)
            .path_arg(&self.config.compile_script)
            .arg(encode(&self.module_options(module, profile)))
            .path_arg(out)
            .path_arg(&tree);
        for dir in dependency_dirs {
            invocation = invocation.path_arg(dir);
        }
        invocation
    }

    /// Compile `module` under `profile`.
    ///
    /// `interfaces` must hold an interface artifact for every dependency,
    /// built under the same profile. Bootstrap modules are never compiled;
    /// they yield an empty fragment.
    pub fn compile(
        &self,
        module: &ModuleDecl,
        profile: Profile,
        interfaces: &[InterfaceArtifact],
    ) -> Result<CompiledFragment> {
        let out = self.dirs.fragment_dir(&module.name, profile);

        if module.bootstrap {
            publish(self.dirs.staging("fragment-")?, &out)?;
            tracing::debug!("{} is a bootstrap module, nothing to compile", module.name);
            return Ok(CompiledFragment::new(&module.name, profile, out));
        }

        let dependency_dirs = self.dependency_interfaces(module, profile, interfaces)?;
        let tree = self.dirs.tree_dir(&module.name);
        if !tree.is_dir() {
            return Err(Error::MissingArtifact(tree));
        }
        for dep in &module.compile_deps {
            if !self.dirs.tree_dir(dep).is_dir() {
                return Err(Error::UnresolvedDependency {
                    module: module.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        let staging = self.dirs.staging("fragment-")?;
        let scratch = self.dirs.staging("scratch-")?;
        let invocation =
            self.module_invocation(module, profile, scratch.path(), staging.path(), &dependency_dirs);

        tracing::info!("Compiling {} [{}]", module.name, profile);
        super::run(&invocation, &module.name, profile)?;
        drop(scratch);

        finalize(module, staging.path())?;
        publish(staging, &out)?;
        Ok(CompiledFragment::new(&module.name, profile, out))
    }

    /// Interface directories of the module's dependencies, in dependency
    /// order.
    fn dependency_interfaces(
        &self,
        module: &ModuleDecl,
        profile: Profile,
        interfaces: &[InterfaceArtifact],
    ) -> Result<Vec<PathBuf>> {
        module
            .effective_deps(&self.config.implicit_deps)
            .into_iter()
            .map(|dep| {
                let interface = interfaces
                    .iter()
                    .find(|i| i.module == dep)
                    .filter(|i| i.dir.is_dir())
                    .ok_or_else(|| Error::UnresolvedDependency {
                        module: module.name.clone(),
                        dependency: dep.clone(),
                    })?;
                if interface.profile != profile {
                    return Err(Error::ProfileMismatch {
                        module: dep,
                        expected: profile,
                        found: interface.profile,
                    });
                }
                Ok(interface.dir.clone())
            })
            .collect()
    }
}

/// Complete a fragment the compiler left without its control files.
fn finalize(module: &ModuleDecl, dir: &Path) -> Result<()> {
    let descriptor = dir.join(EXTERNS_FILE);
    if !descriptor.exists() {
        fs::write(&descriptor, module.interface_descriptor())?;
    }

    let has_registry = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .any(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name != EXTERNS_FILE && is_interface_file(&name)
        });
    if !has_registry {
        tracing::warn!(
            "Compiler wrote no namespace registry for {}, using an empty one",
            module.name
        );
        NamespaceSet::new().write(&dir.join(NAMESPACES_FILE))?;
    }

    let manifest = dir.join(TRANSITIVE_MANIFEST_FILE);
    if !manifest.exists() {
        tracing::warn!(
            "Compiler wrote no {} for {}, using an empty one",
            TRANSITIVE_MANIFEST_FILE,
            module.name
        );
        NamespaceSet::new().write(&manifest)?;
    }
    Ok(())
}
