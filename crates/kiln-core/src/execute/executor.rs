//! Parallel build executor.
//!
//! Runs a build graph level by level using Rayon. Every node writes only its
//! own output location and reads only outputs finalised in earlier levels.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::artifact::{
    ArtifactDigest, CompiledFragment, InterfaceArtifact, TransitiveBundle, digest_dir,
};
use crate::compile::{self, Compiler};
use crate::error::{Error, Result};
use crate::graph::{BuildGraph, NodeKey, NodeKind};
use crate::module::ModuleDecl;
use crate::plan::output_of;
use crate::profile::Profile;
use crate::tree;

use super::cache::ActionCache;

/// How a node was brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The task ran.
    Executed,
    /// The recorded output was reused.
    Cached,
    /// Not run because compilation is disabled.
    Skipped,
}

/// Summary of a finished build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Task ids that ran, in plan order.
    pub executed: Vec<String>,
    /// Task ids whose outputs were reused.
    pub cached: Vec<String>,
    /// Task ids not run because compilation is disabled.
    pub skipped: Vec<String>,
    /// Emitted deployable outputs.
    pub binaries: Vec<PathBuf>,
}

impl BuildReport {
    pub fn was_executed(&self, id: &str) -> bool {
        self.executed.iter().any(|e| e == id)
    }

    pub fn was_cached(&self, id: &str) -> bool {
        self.cached.iter().any(|c| c == id)
    }
}

fn lock_error<T>(e: PoisonError<T>) -> Error {
    Error::Execution(format!("executor lock poisoned (thread panicked): {}", e))
}

/// Executes a [`BuildGraph`] with the content-keyed action cache.
pub struct Executor {
    graph: BuildGraph,
    compiler: Compiler,
    cache: Mutex<ActionCache>,
    /// Output digest of every node finished in this run.
    digests: Mutex<FxHashMap<NodeKey, ArtifactDigest>>,
    jobs: Option<usize>,
}

impl Executor {
    /// Create an executor, loading the project's action cache.
    pub fn new(graph: BuildGraph, compiler: Compiler) -> Self {
        let cache = ActionCache::load(compiler.dirs().action_cache_path());
        Self {
            graph,
            compiler,
            cache: Mutex::new(cache),
            digests: Mutex::new(FxHashMap::default()),
            jobs: None,
        }
    }

    /// Limit the number of tasks running at once.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs.max(1));
        self
    }

    pub fn graph(&self) -> &BuildGraph {
        &self.graph
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, ActionCache>> {
        self.cache.lock().map_err(lock_error)
    }

    fn lock_digests(&self) -> Result<MutexGuard<'_, FxHashMap<NodeKey, ArtifactDigest>>> {
        self.digests.lock().map_err(lock_error)
    }

    /// Run the whole graph.
    ///
    /// Stops after the first level with a failure and returns the first
    /// failing node's error in plan order. The action cache is saved either
    /// way.
    pub fn run(&self) -> Result<BuildReport> {
        let result = match self.jobs {
            Some(jobs) => rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .map_err(|e| Error::Execution(format!("failed to start worker pool: {}", e)))
                .and_then(|pool| pool.install(|| self.run_levels())),
            None => self.run_levels(),
        };

        if let Err(e) = self.lock_cache().and_then(|mut cache| cache.save()) {
            tracing::warn!("Failed to save action cache: {}", e);
        }
        result
    }

    fn run_levels(&self) -> Result<BuildReport> {
        let levels = self.graph.topological_levels()?;
        let mut report = BuildReport::default();

        for (level_idx, level) in levels.iter().enumerate() {
            tracing::debug!("Level {}: {} tasks", level_idx, level.len());

            let results: Vec<Result<Outcome>> =
                level.par_iter().map(|key| self.execute_node(key)).collect();

            for (key, result) in level.iter().zip(results) {
                let id = key.id();
                match result? {
                    Outcome::Executed => report.executed.push(id),
                    Outcome::Cached => report.cached.push(id),
                    Outcome::Skipped => report.skipped.push(id),
                }
                if key.kind == NodeKind::Binary && !report.skipped.contains(&key.id()) {
                    if let Some(binary) = self.graph.binary(&key.name) {
                        let dir = output_of(key, &self.graph, &self.compiler)?;
                        report.binaries.push(dir.join(binary.output_name()));
                    }
                }
            }
        }

        tracing::info!(
            "Build finished: {} executed, {} up to date, {} skipped",
            report.executed.len(),
            report.cached.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Bring one node up to date.
    pub fn execute_node(&self, key: &NodeKey) -> Result<Outcome> {
        let _span = tracing::info_span!("task", id = %key).entered();

        if key.kind != NodeKind::Tree && !self.compiler.config().compilation_enabled {
            return Ok(Outcome::Skipped);
        }

        let output = output_of(key, &self.graph, &self.compiler)?;
        match (key.kind, key.profile) {
            (NodeKind::Tree, _) => self.assemble_tree(key, &output),
            (NodeKind::Fragment, Some(profile)) => {
                let module = self.module(&key.name)?;
                let input_key = self.fragment_key(module, profile)?;
                self.run_cached(key, input_key, &output, || {
                    let interfaces = self.dependency_interfaces(module, profile)?;
                    self.compiler.compile(module, profile, &interfaces).map(|_| ())
                })
            }
            (NodeKind::Interface, Some(profile)) => {
                let module = self.module(&key.name)?;
                let fragment = NodeKey::fragment(&module.name, profile);
                let input_key = ArtifactDigest::of_parts([
                    "interface".to_string(),
                    self.digest_of(&fragment)?.to_string(),
                ]);
                self.run_cached(key, input_key, &output, || {
                    let dirs = self.compiler.dirs();
                    if module.bootstrap {
                        compile::bootstrap_interface(&module.name, profile, dirs)?;
                    } else {
                        let fragment = CompiledFragment::new(
                            &module.name,
                            profile,
                            dirs.fragment_dir(&module.name, profile),
                        );
                        compile::extract(&fragment, dirs)?;
                    }
                    Ok(())
                })
            }
            (NodeKind::Bundle, Some(profile)) => {
                let module = self.module(&key.name)?;
                let input_key = self.bundle_key(module, profile)?;
                self.run_cached(key, input_key, &output, || self.merge(module, profile))
            }
            (NodeKind::Binary, Some(profile)) => {
                let binary = self
                    .graph
                    .binary(&key.name)
                    .ok_or_else(|| Error::Manifest(format!("no [[binary]] named '{}'", key.name)))?;
                let bundle_dir = self.compiler.dirs().bundle_dir(&binary.module, profile);
                let invocation = self.compiler.binary_invocation(
                    binary,
                    &bundle_dir,
                    Path::new("scratch"),
                    Path::new("out"),
                );
                let input_key = ArtifactDigest::of_parts([
                    "binary".to_string(),
                    binary.output_name().to_string(),
                    invocation.shell_line(),
                    self.digest_of(&NodeKey::bundle(&binary.module, profile))?.to_string(),
                ]);
                self.run_cached(key, input_key, &output, || {
                    let bundle = TransitiveBundle::new(&binary.module, profile, bundle_dir.clone());
                    self.compiler.emit_binary(binary, &bundle).map(|_| ())
                })
            }
            (_, None) => Err(Error::Execution(format!("task {} has no profile", key))),
        }
    }

    /// Trees are cheap to rebuild and always reassembled; the cache only
    /// tells whether their content changed.
    fn assemble_tree(&self, key: &NodeKey, output: &Path) -> Result<Outcome> {
        let module = self.module(&key.name)?;
        tree::assemble(module, self.compiler.dirs())?;

        let digest = digest_dir(output)?;
        let input_key = ArtifactDigest::of_parts(["tree", digest.as_str()]);
        let id = key.id();

        let mut cache = self.lock_cache()?;
        let unchanged = cache
            .get(&id)
            .is_some_and(|entry| entry.input_key == input_key && entry.output_digest == digest);
        if !unchanged {
            cache.record(id, input_key, digest.clone());
        }
        drop(cache);

        self.lock_digests()?.insert(key.clone(), digest);
        Ok(if unchanged {
            Outcome::Cached
        } else {
            Outcome::Executed
        })
    }

    fn run_cached(
        &self,
        key: &NodeKey,
        input_key: ArtifactDigest,
        output: &Path,
        action: impl FnOnce() -> Result<()>,
    ) -> Result<Outcome> {
        let id = key.id();
        let entry = self.lock_cache()?.get(&id).cloned();

        if let Some(entry) = entry.filter(|e| e.is_fresh(&input_key, output)) {
            tracing::debug!("{} is up to date", id);
            self.lock_digests()?.insert(key.clone(), entry.output_digest);
            return Ok(Outcome::Cached);
        }

        self.lock_cache()?.invalidate(&id);
        action()?;

        let digest = digest_dir(output)?;
        tracing::info!("Built {}", id);
        self.lock_cache()?.record(id, input_key, digest.clone());
        self.lock_digests()?.insert(key.clone(), digest);
        Ok(Outcome::Executed)
    }

    fn module(&self, name: &str) -> Result<&ModuleDecl> {
        self.graph
            .module(name)
            .ok_or_else(|| Error::UnresolvedDependency {
                module: name.to_string(),
                dependency: name.to_string(),
            })
    }

    /// Output digest of a finished node.
    fn digest_of(&self, key: &NodeKey) -> Result<ArtifactDigest> {
        if let Some(digest) = self.lock_digests()?.get(key) {
            return Ok(digest.clone());
        }
        digest_dir(&output_of(key, &self.graph, &self.compiler)?)
    }

    /// Everything a module compile reads: the command line, the source tree,
    /// dependency interfaces and compile-only trees.
    fn fragment_key(&self, module: &ModuleDecl, profile: Profile) -> Result<ArtifactDigest> {
        let mut parts = vec![
            "fragment".to_string(),
            module.name.clone(),
            profile.to_string(),
        ];
        if module.bootstrap {
            parts.push("bootstrap".to_string());
            return Ok(ArtifactDigest::of_parts(parts));
        }

        let dirs = self.compiler.dirs();
        let deps = self.graph.effective_deps(module);
        let dependency_dirs: Vec<PathBuf> =
            deps.iter().map(|dep| dirs.interface_dir(dep, profile)).collect();
        let invocation = self.compiler.module_invocation(
            module,
            profile,
            Path::new("scratch"),
            Path::new("out"),
            &dependency_dirs,
        );
        parts.push(invocation.shell_line());
        parts.push(self.digest_of(&NodeKey::tree(&module.name))?.to_string());
        for dep in &deps {
            parts.push(dep.clone());
            parts.push(self.digest_of(&NodeKey::interface(dep, profile))?.to_string());
        }
        for dep in &module.compile_deps {
            parts.push(dep.clone());
            parts.push(self.digest_of(&NodeKey::tree(dep))?.to_string());
        }
        Ok(ArtifactDigest::of_parts(parts))
    }

    fn bundle_key(&self, module: &ModuleDecl, profile: Profile) -> Result<ArtifactDigest> {
        let mut parts = vec![
            "bundle".to_string(),
            module.bootstrap.to_string(),
            self.digest_of(&NodeKey::fragment(&module.name, profile))?.to_string(),
            self.digest_of(&NodeKey::interface(&module.name, profile))?.to_string(),
        ];
        for dep in self.graph.effective_deps(module) {
            let digest = self.digest_of(&NodeKey::bundle(&dep, profile))?;
            parts.push(dep);
            parts.push(digest.to_string());
        }
        Ok(ArtifactDigest::of_parts(parts))
    }

    fn dependency_interfaces(&self, module: &ModuleDecl, profile: Profile) -> Result<Vec<InterfaceArtifact>> {
        let dirs = self.compiler.dirs();
        self.graph
            .effective_deps(module)
            .into_iter()
            .map(|dep| {
                let key = NodeKey::interface(&dep, profile);
                Ok(InterfaceArtifact {
                    digest: self.digest_of(&key)?,
                    dir: dirs.interface_dir(&dep, profile),
                    module: dep,
                    profile,
                })
            })
            .collect()
    }

    fn merge(&self, module: &ModuleDecl, profile: Profile) -> Result<()> {
        let dirs = self.compiler.dirs();
        if module.bootstrap {
            compile::bootstrap_bundle(&module.name, profile, dirs)?;
            return Ok(());
        }

        let fragment =
            CompiledFragment::new(&module.name, profile, dirs.fragment_dir(&module.name, profile));
        let interface = InterfaceArtifact {
            module: module.name.clone(),
            profile,
            dir: dirs.interface_dir(&module.name, profile),
            digest: self.digest_of(&NodeKey::interface(&module.name, profile))?,
        };
        let deps: Vec<TransitiveBundle> = self
            .graph
            .effective_deps(module)
            .into_iter()
            .map(|dep| {
                let dir = dirs.bundle_dir(&dep, profile);
                TransitiveBundle::new(dep, profile, dir)
            })
            .collect();

        compile::merge(&fragment, &interface, &deps, dirs)?;
        Ok(())
    }
}
