//! The build graph.

use std::collections::VecDeque;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::module::{BinaryDecl, ModuleDecl};
use crate::profile::Profile;

use super::types::NodeKey;

/// Every artifact of a project as one graph; edges go from input to
/// consumer.
///
/// Nodes are stored in an arena and addressed by index, with a map from
/// [`NodeKey`] to index. Insertion follows manifest order, so traversals
/// are deterministic.
#[derive(Debug, Clone)]
pub struct BuildGraph {
    graph: DiGraph<NodeKey, ()>,
    node_indices: FxHashMap<NodeKey, NodeIndex>,
    modules: Vec<ModuleDecl>,
    binaries: Vec<BinaryDecl>,
    implicit_deps: Vec<String>,
    profiles: Vec<Profile>,
}

impl BuildGraph {
    /// Build the graph of `manifest` for the profiles in use.
    ///
    /// Profiles in use are those requested by `config` plus those the
    /// binaries are emitted under; with neither, the `none` profile.
    pub fn build(manifest: &Manifest, config: &BuildConfig) -> Result<Self> {
        manifest.validate()?;

        let mut profiles: Vec<Profile> = Profile::ALL
            .into_iter()
            .filter(|p| config.profiles.contains(p) || manifest.binaries.iter().any(|b| b.profile == *p))
            .collect();
        if profiles.is_empty() {
            profiles.push(Profile::None);
        }

        let mut graph = Self {
            graph: DiGraph::new(),
            node_indices: FxHashMap::default(),
            modules: manifest.modules.clone(),
            binaries: manifest.binaries.clone(),
            implicit_deps: config.implicit_deps.clone(),
            profiles,
        };

        graph.check_references()?;
        graph.detect_cycles()?;
        graph.add_nodes();
        graph.add_edges();
        Ok(graph)
    }

    fn check_references(&self) -> Result<()> {
        let names: FxHashSet<&str> = self.modules.iter().map(|m| m.name.as_str()).collect();

        for module in &self.modules {
            let referenced = self
                .effective_deps(module)
                .into_iter()
                .chain(module.compile_deps.iter().cloned());
            for dep in referenced {
                if !names.contains(dep.as_str()) {
                    return Err(Error::UnresolvedDependency {
                        module: module.name.clone(),
                        dependency: dep,
                    });
                }
            }
        }

        for binary in &self.binaries {
            if !names.contains(binary.module.as_str()) {
                return Err(Error::UnresolvedDependency {
                    module: binary.name.clone(),
                    dependency: binary.module.clone(),
                });
            }
        }
        Ok(())
    }

    /// Reject cyclic runtime dependencies, naming one cycle.
    fn detect_cycles(&self) -> Result<()> {
        use petgraph::algo::kosaraju_scc;

        for module in &self.modules {
            if module.deps.contains(&module.name) {
                return Err(Error::CyclicDependency(format!(
                    "{} → {}",
                    module.name, module.name
                )));
            }
        }

        let mut deps_graph: DiGraph<&str, ()> = DiGraph::new();
        let indices: FxHashMap<&str, NodeIndex> = self
            .modules
            .iter()
            .map(|m| (m.name.as_str(), deps_graph.add_node(m.name.as_str())))
            .collect();
        for module in &self.modules {
            for dep in self.effective_deps(module) {
                deps_graph.add_edge(indices[module.name.as_str()], indices[dep.as_str()], ());
            }
        }

        for scc in kosaraju_scc(&deps_graph) {
            if scc.len() > 1 {
                let members: FxHashSet<NodeIndex> = scc.iter().copied().collect();
                let start = scc.iter().copied().min().unwrap_or(scc[0]);
                let path = cycle_from(&deps_graph, start, &members);
                let names: Vec<&str> = path.iter().map(|&idx| deps_graph[idx]).collect();
                return Err(Error::CyclicDependency(format!(
                    "{} → {}",
                    names.join(" → "),
                    names[0]
                )));
            }
        }
        Ok(())
    }

    fn add_nodes(&mut self) {
        let modules = self.modules.clone();
        for module in &modules {
            self.add_node(NodeKey::tree(&module.name));
        }
        for &profile in &self.profiles.clone() {
            for module in &modules {
                self.add_node(NodeKey::fragment(&module.name, profile));
                self.add_node(NodeKey::interface(&module.name, profile));
                self.add_node(NodeKey::bundle(&module.name, profile));
            }
        }
        for binary in &self.binaries.clone() {
            self.add_node(NodeKey::binary(&binary.name, binary.profile));
        }
    }

    fn add_node(&mut self, key: NodeKey) {
        let idx = self.graph.add_node(key.clone());
        self.node_indices.insert(key, idx);
    }

    fn add_edges(&mut self) {
        let mut edges = Vec::new();

        for &profile in &self.profiles {
            for module in &self.modules {
                let name = module.name.as_str();
                let fragment = NodeKey::fragment(name, profile);
                let interface = NodeKey::interface(name, profile);
                let bundle = NodeKey::bundle(name, profile);

                edges.push((NodeKey::tree(name), fragment.clone()));
                for dep in &module.compile_deps {
                    edges.push((NodeKey::tree(dep), fragment.clone()));
                }
                for dep in self.effective_deps(module) {
                    edges.push((NodeKey::interface(&dep, profile), fragment.clone()));
                    edges.push((NodeKey::bundle(&dep, profile), bundle.clone()));
                }
                edges.push((fragment.clone(), interface.clone()));
                edges.push((fragment, bundle.clone()));
                edges.push((interface, bundle));
            }
        }

        for binary in &self.binaries {
            edges.push((
                NodeKey::bundle(&binary.module, binary.profile),
                NodeKey::binary(&binary.name, binary.profile),
            ));
        }

        for (from, to) in edges {
            let from = self.node_indices[&from];
            let to = self.node_indices[&to];
            self.graph.update_edge(from, to, ());
        }
    }

    /// Declared dependencies plus the implicit base libraries.
    pub fn effective_deps(&self, module: &ModuleDecl) -> Vec<String> {
        module.effective_deps(&self.implicit_deps)
    }

    pub fn module(&self, name: &str) -> Option<&ModuleDecl> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn binary(&self, name: &str) -> Option<&BinaryDecl> {
        self.binaries.iter().find(|b| b.name == name)
    }

    /// Profiles with nodes in this graph, in registry order.
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.node_indices.contains_key(key)
    }

    /// Node keys in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeKey> {
        self.graph.node_weights()
    }

    /// Direct inputs of a node, in insertion order.
    pub fn inputs(&self, key: &NodeKey) -> Vec<NodeKey> {
        let Some(&idx) = self.node_indices.get(key) else {
            return Vec::new();
        };
        let mut inputs: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        inputs.sort();
        inputs.into_iter().map(|i| self.graph[i].clone()).collect()
    }

    /// Nodes in topological order (inputs before consumers).
    pub fn topological_order(&self) -> Result<Vec<NodeKey>> {
        use petgraph::algo::toposort;

        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|idx| self.graph[idx].clone()).collect())
            .map_err(|cycle| {
                Error::CyclicDependency(format!("cycle at {}", self.graph[cycle.node_id()]))
            })
    }

    /// Group nodes by dependency level.
    ///
    /// Nodes in one level have no edges between them and may run in
    /// parallel; every input of a node sits in an earlier level. Within a
    /// level nodes keep insertion order.
    pub fn topological_levels(&self) -> Result<Vec<Vec<NodeKey>>> {
        let order = self.topological_order()?;
        let mut depth: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        let mut levels: Vec<Vec<NodeIndex>> = Vec::new();

        for key in &order {
            let idx = self.node_indices[key];
            let level = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .map(|input| depth[&input] + 1)
                .max()
                .unwrap_or(0);
            depth.insert(idx, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(idx);
        }

        Ok(levels
            .into_iter()
            .map(|mut level| {
                level.sort();
                level.into_iter().map(|idx| self.graph[idx].clone()).collect()
            })
            .collect())
    }

    /// The subgraph holding `targets` and everything they transitively need.
    pub fn closure(&self, targets: &[NodeKey]) -> Result<Self> {
        let mut keep: FxHashSet<NodeIndex> = FxHashSet::default();
        let mut queue = VecDeque::new();
        for target in targets {
            let idx = self.node_indices.get(target).copied().ok_or_else(|| {
                Error::Manifest(format!("no build target named '{}'", target))
            })?;
            if keep.insert(idx) {
                queue.push_back(idx);
            }
        }
        while let Some(idx) = queue.pop_front() {
            for input in self.graph.neighbors_directed(idx, Direction::Incoming) {
                if keep.insert(input) {
                    queue.push_back(input);
                }
            }
        }

        let mut sub = Self {
            graph: DiGraph::new(),
            node_indices: FxHashMap::default(),
            modules: self.modules.clone(),
            binaries: self.binaries.clone(),
            implicit_deps: self.implicit_deps.clone(),
            profiles: self.profiles.clone(),
        };
        for idx in self.graph.node_indices().filter(|i| keep.contains(i)) {
            sub.add_node(self.graph[idx].clone());
        }
        for edge in self.graph.raw_edges() {
            if keep.contains(&edge.source()) && keep.contains(&edge.target()) {
                let from = sub.node_indices[&self.graph[edge.source()]];
                let to = sub.node_indices[&self.graph[edge.target()]];
                sub.graph.add_edge(from, to, ());
            }
        }
        Ok(sub)
    }

    /// Key of the binary named `name`.
    pub fn binary_target(&self, name: &str) -> Result<NodeKey> {
        self.binary(name)
            .map(|b| NodeKey::binary(&b.name, b.profile))
            .ok_or_else(|| Error::Manifest(format!("no [[binary]] named '{}'", name)))
    }
}

/// A cycle through `start` inside one strongly connected component.
fn cycle_from(graph: &DiGraph<&str, ()>, start: NodeIndex, members: &FxHashSet<NodeIndex>) -> Vec<NodeIndex> {
    let mut parent: FxHashMap<NodeIndex, NodeIndex> = FxHashMap::default();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        let mut successors: Vec<NodeIndex> = graph.neighbors(node).collect();
        successors.sort();
        for next in successors {
            if !members.contains(&next) {
                continue;
            }
            if next == start {
                let mut path = vec![node];
                let mut current = node;
                while current != start {
                    current = parent[&current];
                    path.push(current);
                }
                path.reverse();
                return path;
            }
            if let std::collections::hash_map::Entry::Vacant(slot) = parent.entry(next) {
                slot.insert(node);
                queue.push_back(next);
            }
        }
    }

    members.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    fn manifest(modules: Vec<ModuleDecl>, binaries: Vec<BinaryDecl>) -> Manifest {
        Manifest {
            build: BuildConfig::default(),
            modules,
            binaries,
        }
    }

    fn graph(modules: Vec<ModuleDecl>) -> Result<BuildGraph> {
        BuildGraph::build(&manifest(modules, Vec::new()), &BuildConfig::default())
    }

    #[test]
    fn test_nodes_per_profile() {
        let m = manifest(
            vec![ModuleDecl::new("a")],
            vec![BinaryDecl::new("app", "a.core", "a")],
        );
        let config = BuildConfig {
            profiles: vec![Profile::None],
            ..Default::default()
        };
        let graph = BuildGraph::build(&m, &config).unwrap();

        assert_eq!(graph.profiles(), &[Profile::None, Profile::Advanced]);
        // 1 tree + 3 nodes per profile + 1 binary
        assert_eq!(graph.len(), 1 + 3 * 2 + 1);
        assert!(graph.contains(&NodeKey::fragment("a", Profile::Advanced)));
        assert!(!graph.contains(&NodeKey::fragment("a", Profile::Whitespace)));
    }

    #[test]
    fn test_default_profile_is_none() {
        let graph = graph(vec![ModuleDecl::new("a")]).unwrap();
        assert_eq!(graph.profiles(), &[Profile::None]);
    }

    #[test]
    fn test_fragment_inputs() {
        let graph = graph(vec![
            ModuleDecl::new("macros"),
            ModuleDecl::new("util"),
            ModuleDecl::new("core")
                .with_deps(["util"])
                .with_compile_deps(["macros"]),
        ])
        .unwrap();

        let inputs = graph.inputs(&NodeKey::fragment("core", Profile::None));
        assert_eq!(
            inputs,
            vec![
                NodeKey::tree("macros"),
                NodeKey::tree("core"),
                NodeKey::interface("util", Profile::None),
            ]
        );

        let bundle_inputs = graph.inputs(&NodeKey::bundle("core", Profile::None));
        assert!(bundle_inputs.contains(&NodeKey::bundle("util", Profile::None)));
        assert!(bundle_inputs.contains(&NodeKey::interface("core", Profile::None)));
        assert!(!bundle_inputs.contains(&NodeKey::bundle("macros", Profile::None)));
    }

    #[test]
    fn test_implicit_deps_become_edges() {
        let m = manifest(
            vec![ModuleDecl::new("cljs").bootstrap(), ModuleDecl::new("app")],
            Vec::new(),
        );
        let config = BuildConfig {
            implicit_deps: vec!["cljs".to_string()],
            ..Default::default()
        };
        let graph = BuildGraph::build(&m, &config).unwrap();

        let inputs = graph.inputs(&NodeKey::fragment("app", Profile::None));
        assert!(inputs.contains(&NodeKey::interface("cljs", Profile::None)));
        assert!(graph.inputs(&NodeKey::fragment("cljs", Profile::None)).len() == 1);
    }

    #[test]
    fn test_unresolved_dependency() {
        let err = graph(vec![ModuleDecl::new("a").with_deps(["missing"])]).unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedDependency { ref module, ref dependency }
                if module == "a" && dependency == "missing"
        ));
    }

    #[test]
    fn test_unresolved_binary_module() {
        let m = manifest(vec![], vec![BinaryDecl::new("app", "app.core", "app.core")]);
        let err = BuildGraph::build(&m, &BuildConfig::default()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedDependency { .. }));
    }

    #[test]
    fn test_cycle_detection() {
        let err = graph(vec![
            ModuleDecl::new("a").with_deps(["b"]),
            ModuleDecl::new("b").with_deps(["c"]),
            ModuleDecl::new("c").with_deps(["a"]),
        ])
        .unwrap_err();

        match err {
            Error::CyclicDependency(msg) => assert_eq!(msg, "a → b → c → a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let err = graph(vec![ModuleDecl::new("a").with_deps(["a"])]).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency(_)));
    }

    #[test]
    fn test_compile_deps_may_point_back() {
        // Compile-only dependencies read trees, which have no inputs.
        let graph = graph(vec![
            ModuleDecl::new("macros").with_compile_deps(["core"]),
            ModuleDecl::new("core").with_deps(["macros"]),
        ]);
        assert!(graph.is_ok());
    }

    #[test]
    fn test_levels_respect_edges() {
        let graph = graph(vec![
            ModuleDecl::new("util"),
            ModuleDecl::new("core").with_deps(["util"]),
        ])
        .unwrap();

        let levels = graph.topological_levels().unwrap();
        let level_of = |key: &NodeKey| levels.iter().position(|l| l.contains(key)).unwrap();

        assert_eq!(levels[0], vec![NodeKey::tree("util"), NodeKey::tree("core")]);
        for key in graph.nodes() {
            for input in graph.inputs(key) {
                assert!(level_of(&input) < level_of(key), "{} before {}", input, key);
            }
        }
    }

    #[test]
    fn test_closure_of_binary() {
        let m = manifest(
            vec![
                ModuleDecl::new("util"),
                ModuleDecl::new("core").with_deps(["util"]),
                ModuleDecl::new("unrelated"),
            ],
            vec![BinaryDecl::new("app", "core", "core").with_profile(Profile::Whitespace)],
        );
        let config = BuildConfig {
            profiles: vec![Profile::None],
            ..Default::default()
        };
        let graph = BuildGraph::build(&m, &config).unwrap();

        let target = graph.binary_target("app").unwrap();
        let sub = graph.closure(&[target]).unwrap();

        assert!(sub.contains(&NodeKey::bundle("util", Profile::Whitespace)));
        assert!(!sub.contains(&NodeKey::tree("unrelated")));
        assert!(sub.nodes().all(|k| k.kind == NodeKind::Tree || k.profile == Some(Profile::Whitespace)));
        // util: tree, fragment, interface, bundle; core: the same; binary.
        assert_eq!(sub.len(), 9);
    }

    #[test]
    fn test_unknown_binary_target() {
        let graph = graph(vec![ModuleDecl::new("a")]).unwrap();
        assert!(matches!(graph.binary_target("nope"), Err(Error::Manifest(_))));
    }
}
