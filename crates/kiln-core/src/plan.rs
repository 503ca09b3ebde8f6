//! Task plan for build orchestrators.
//!
//! The plan lists one task per graph node with its declared inputs, its
//! single output location and, for compiler steps, the exact command line.
//! An external orchestrator can schedule it without knowing anything about
//! modules or profiles.

use std::path::PathBuf;

use serde::Serialize;

use crate::compile::Compiler;
use crate::error::{Error, Result};
use crate::graph::{BuildGraph, NodeKey, NodeKind};
use crate::profile::Profile;

/// One schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanTask {
    pub id: String,
    pub kind: NodeKind,
    /// Module name, or binary name for binary tasks.
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    /// Dependency level; tasks in one level are independent.
    pub level: usize,
    /// Ids of the tasks whose outputs this task reads.
    pub inputs: Vec<String>,
    /// The only location this task writes.
    pub output: PathBuf,
    /// Shell command line for compiler tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// All tasks of a build in topological order.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub profiles: Vec<Profile>,
    pub tasks: Vec<PlanTask>,
}

impl BuildPlan {
    /// Render `graph` as a task list.
    pub fn new(graph: &BuildGraph, compiler: &Compiler) -> Result<Self> {
        let mut tasks = Vec::with_capacity(graph.len());
        for (level, keys) in graph.topological_levels()?.into_iter().enumerate() {
            for key in keys {
                tasks.push(PlanTask {
                    id: key.id(),
                    kind: key.kind,
                    module: key.name.clone(),
                    profile: key.profile,
                    level,
                    inputs: graph.inputs(&key).iter().map(NodeKey::id).collect(),
                    output: output_of(&key, graph, compiler)?,
                    command: command_of(&key, graph, compiler)?,
                });
            }
        }

        Ok(Self {
            profiles: graph.profiles().to_vec(),
            tasks,
        })
    }

    pub fn task(&self, id: &str) -> Option<&PlanTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Final output location of a node.
pub fn output_of(key: &NodeKey, graph: &BuildGraph, compiler: &Compiler) -> Result<PathBuf> {
    let dirs = compiler.dirs();
    let profile = || {
        key.profile
            .ok_or_else(|| Error::Manifest(format!("task {} has no profile", key)))
    };
    Ok(match key.kind {
        NodeKind::Tree => dirs.tree_dir(&key.name),
        NodeKind::Fragment => dirs.fragment_dir(&key.name, profile()?),
        NodeKind::Interface => dirs.interface_dir(&key.name, profile()?),
        NodeKind::Bundle => dirs.bundle_dir(&key.name, profile()?),
        NodeKind::Binary => {
            let binary = graph
                .binary(&key.name)
                .ok_or_else(|| Error::Manifest(format!("no [[binary]] named '{}'", key.name)))?;
            dirs.binary_dir(&binary.name, binary.profile)
        }
    })
}

fn command_of(key: &NodeKey, graph: &BuildGraph, compiler: &Compiler) -> Result<Option<String>> {
    let dirs = compiler.dirs();
    let scratch = dirs.tmp_dir.join(format!("scratch-{}", key.id().replace(':', "-")));

    match (key.kind, key.profile) {
        (NodeKind::Fragment, Some(profile)) => {
            let module = graph.module(&key.name).ok_or_else(|| Error::UnresolvedDependency {
                module: key.name.clone(),
                dependency: key.name.clone(),
            })?;
            if module.bootstrap {
                return Ok(None);
            }
            let dependency_dirs: Vec<PathBuf> = graph
                .effective_deps(module)
                .iter()
                .map(|dep| dirs.interface_dir(dep, profile))
                .collect();
            let out = dirs.fragment_dir(&module.name, profile);
            let invocation =
                compiler.module_invocation(module, profile, &scratch, &out, &dependency_dirs);
            Ok(Some(invocation.shell_line()))
        }
        (NodeKind::Binary, Some(_)) => {
            let binary = graph
                .binary(&key.name)
                .ok_or_else(|| Error::Manifest(format!("no [[binary]] named '{}'", key.name)))?;
            let bundle = dirs.bundle_dir(&binary.module, binary.profile);
            let output = dirs
                .binary_dir(&binary.name, binary.profile)
                .join(binary.output_name());
            let invocation = compiler.binary_invocation(binary, &bundle, &scratch, &output);
            Ok(Some(invocation.shell_line()))
        }
        _ => Ok(None),
    }
}
