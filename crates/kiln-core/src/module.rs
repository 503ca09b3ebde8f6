//! Module and binary declarations.

use std::fmt;
use std::path::PathBuf;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::options::{ConfigValue, encode};
use crate::profile::Profile;

/// Ordered mapping from logical tree paths to physical source paths.
///
/// Declared either as a list (each path maps to itself) or as a table of
/// `logical = physical` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileMap(Vec<(String, PathBuf)>);

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every path to itself.
    pub fn identity<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            paths
                .into_iter()
                .map(|p| {
                    let p = p.into();
                    let physical = PathBuf::from(&p);
                    (p, physical)
                })
                .collect(),
        )
    }

    /// Add a mapping.
    pub fn with(mut self, logical: impl Into<String>, physical: impl Into<PathBuf>) -> Self {
        self.0.push((logical.into(), physical.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathBuf)> {
        self.0.iter().map(|(logical, physical)| (logical.as_str(), physical))
    }

    /// Logical paths in declaration order.
    pub fn logical_paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(logical, _)| logical.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FileMapVisitor;

        impl<'de> Visitor<'de> for FileMapVisitor {
            type Value = FileMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list of paths or a table of logical = physical paths")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FileMap, A::Error> {
                let mut paths = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(path) = seq.next_element::<String>()? {
                    paths.push(path);
                }
                Ok(FileMap::identity(paths))
            }

            // Entries keep the order they were declared in.
            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FileMap, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((logical, physical)) = map.next_entry::<String, PathBuf>()? {
                    entries.push((logical, physical));
                }
                Ok(FileMap(entries))
            }
        }

        deserializer.deserialize_any(FileMapVisitor)
    }
}

/// A logical compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDecl {
    /// Unique module name.
    pub name: String,
    /// Source files placed in the module's virtual tree.
    #[serde(default)]
    pub srcs: FileMap,
    /// Raw resource files placed in the virtual tree.
    #[serde(default)]
    pub resources: FileMap,
    /// Third-party externs declarations.
    #[serde(default)]
    pub externs: FileMap,
    /// Runtime dependencies, in declaration order.
    #[serde(default)]
    pub deps: Vec<String>,
    /// Modules whose sources must be visible to the compiler but that are
    /// not part of the runtime dependency graph.
    #[serde(default)]
    pub compile_deps: Vec<String>,
    /// Per-module compiler options merged over the profile.
    #[serde(default)]
    pub compiler_options: ConfigValue,
    /// Pre-built base library consumed as runtime globals; never compiled.
    #[serde(default)]
    pub bootstrap: bool,
}

impl ModuleDecl {
    /// Create a module with no sources or dependencies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            srcs: FileMap::new(),
            resources: FileMap::new(),
            externs: FileMap::new(),
            deps: Vec::new(),
            compile_deps: Vec::new(),
            compiler_options: ConfigValue::empty_map(),
            bootstrap: false,
        }
    }

    pub fn with_srcs(mut self, srcs: FileMap) -> Self {
        self.srcs = srcs;
        self
    }

    pub fn with_resources(mut self, resources: FileMap) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_externs(mut self, externs: FileMap) -> Self {
        self.externs = externs;
        self
    }

    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_compile_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compile_deps = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_compiler_options(mut self, options: ConfigValue) -> Self {
        self.compiler_options = options;
        self
    }

    pub fn bootstrap(mut self) -> Self {
        self.bootstrap = true;
        self
    }

    /// Runtime dependencies with the implicit base libraries appended.
    ///
    /// Duplicates are dropped, keeping the first declaration, so the order
    /// is stable across builds. Bootstrap modules have no dependencies.
    pub fn effective_deps(&self, implicit: &[String]) -> Vec<String> {
        if self.bootstrap {
            return Vec::new();
        }

        let mut deps: Vec<String> = Vec::with_capacity(self.deps.len() + implicit.len());
        for dep in self.deps.iter().chain(implicit.iter()) {
            if dep != &self.name && !deps.contains(dep) {
                deps.push(dep.clone());
            }
        }
        deps
    }

    /// Interface descriptor listing this module's externs, possibly none.
    pub fn interface_descriptor(&self) -> String {
        let externs = ConfigValue::vector(self.externs.logical_paths());
        format!("{}\n", encode(&ConfigValue::map([(":externs", externs)])))
    }

    /// The interface descriptor placed in the virtual tree.
    ///
    /// Returns `None` when the module declares no externs.
    pub fn externs_descriptor(&self) -> Option<String> {
        (!self.externs.is_empty()).then(|| self.interface_descriptor())
    }
}

/// A final deployable bundle built from one entry module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryDecl {
    /// Binary name.
    pub name: String,
    /// Entry namespace passed to the compiler as `:main`.
    pub main: String,
    /// Module whose transitive bundle is compiled.
    pub module: String,
    /// Profile the bundle is emitted under.
    #[serde(default = "default_binary_profile")]
    pub profile: Profile,
    /// Output path inside the binary's directory (defaults to the name).
    #[serde(default)]
    pub output: Option<String>,
    /// Options merged over the profile.
    #[serde(default)]
    pub compiler_options: ConfigValue,
}

fn default_binary_profile() -> Profile {
    Profile::Advanced
}

impl BinaryDecl {
    pub fn new(name: impl Into<String>, main: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            main: main.into(),
            module: module.into(),
            profile: default_binary_profile(),
            output: None,
            compiler_options: ConfigValue::empty_map(),
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Output name of the deployable bundle.
    pub fn output_name(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.name)
    }

    /// Profile options plus the binary's overrides and entry designation.
    pub fn resolved_options(&self) -> ConfigValue {
        let mut options = self.profile.config(&self.compiler_options);
        options.insert(":final-output", true);
        options.insert(":main", self.main.clone());
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_deps_appends_implicit() {
        let module = ModuleDecl::new("app.core").with_deps(["app.util", "cljs", "app.util"]);
        let implicit = vec!["cljs".to_string(), "goog".to_string()];

        assert_eq!(module.effective_deps(&implicit), vec!["app.util", "cljs", "goog"]);
    }

    #[test]
    fn test_effective_deps_skips_self_and_bootstrap() {
        let implicit = vec!["cljs".to_string()];

        let base = ModuleDecl::new("cljs");
        assert!(base.effective_deps(&implicit).is_empty());

        let vendored = ModuleDecl::new("goog").with_deps(["x"]).bootstrap();
        assert!(vendored.effective_deps(&implicit).is_empty());
    }

    #[test]
    fn test_externs_descriptor() {
        let module = ModuleDecl::new("app.maps")
            .with_externs(FileMap::new().with("externs/maps.js", "vendor/maps-externs.js"));

        assert_eq!(
            module.externs_descriptor().as_deref(),
            Some("{:externs [\"externs/maps.js\"]}\n")
        );
        assert!(ModuleDecl::new("plain").externs_descriptor().is_none());
        assert_eq!(
            ModuleDecl::new("plain").interface_descriptor(),
            "{:externs []}\n"
        );
    }

    #[test]
    fn test_file_map_from_list_and_table() {
        #[derive(Deserialize)]
        struct Holder {
            a: FileMap,
            b: FileMap,
        }

        let holder: Holder = toml::from_str(
            r#"
a = ["app/core.cljs"]
b = { "app/util.cljs" = "gen/util.cljs" }
"#,
        )
        .unwrap();

        assert_eq!(
            holder.a.iter().collect::<Vec<_>>(),
            vec![("app/core.cljs", &PathBuf::from("app/core.cljs"))]
        );
        assert_eq!(
            holder.b.iter().collect::<Vec<_>>(),
            vec![("app/util.cljs", &PathBuf::from("gen/util.cljs"))]
        );
    }

    #[test]
    fn test_file_map_table_keeps_declaration_order() {
        #[derive(Deserialize)]
        struct Holder {
            srcs: FileMap,
        }

        let holder: Holder = toml::from_str(
            r#"
srcs = { "z/last.cljs" = "src/z.cljs", "a/first.cljs" = "src/a.cljs", "m/mid.cljs" = "src/m.cljs" }
"#,
        )
        .unwrap();

        assert_eq!(
            holder.srcs.logical_paths().collect::<Vec<_>>(),
            vec!["z/last.cljs", "a/first.cljs", "m/mid.cljs"]
        );

        let holder: Holder =
            serde_json::from_str(r#"{"srcs": {"b.cljs": "x.cljs", "a.cljs": "y.cljs"}}"#).unwrap();
        assert_eq!(holder.srcs.logical_paths().collect::<Vec<_>>(), vec!["b.cljs", "a.cljs"]);
    }

    #[test]
    fn test_binary_resolved_options() {
        let binary = BinaryDecl::new("app", "app.core", "app.core");
        let options = binary.resolved_options();

        assert_eq!(options.get(":final-output"), Some(&ConfigValue::Bool(true)));
        assert_eq!(options.get(":main"), Some(&ConfigValue::from("app.core")));
        assert_eq!(options.get(":optimizations"), Some(&ConfigValue::from(":advanced")));
        assert_eq!(binary.output_name(), "app");
    }
}
