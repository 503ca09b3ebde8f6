//! Node identities for the build graph.

use std::fmt;

use serde::Serialize;

use crate::profile::Profile;

/// What a graph node produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Virtual source tree (profile independent).
    Tree,
    /// Compiler output of one module.
    Fragment,
    /// Public surface of a fragment.
    Interface,
    /// Transitive merge of a module and its dependencies.
    Bundle,
    /// Deployable output of a binary.
    Binary,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Fragment => "fragment",
            Self::Interface => "interface",
            Self::Bundle => "bundle",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of a graph node: `(name, kind, profile)`.
///
/// `name` is a module name for every kind except [`NodeKind::Binary`],
/// where it is the binary name. Only trees carry no profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey {
    pub name: String,
    pub kind: NodeKind,
    pub profile: Option<Profile>,
}

impl NodeKey {
    pub fn tree(module: impl Into<String>) -> Self {
        Self {
            name: module.into(),
            kind: NodeKind::Tree,
            profile: None,
        }
    }

    pub fn fragment(module: impl Into<String>, profile: Profile) -> Self {
        Self::profiled(module, NodeKind::Fragment, profile)
    }

    pub fn interface(module: impl Into<String>, profile: Profile) -> Self {
        Self::profiled(module, NodeKind::Interface, profile)
    }

    pub fn bundle(module: impl Into<String>, profile: Profile) -> Self {
        Self::profiled(module, NodeKind::Bundle, profile)
    }

    pub fn binary(name: impl Into<String>, profile: Profile) -> Self {
        Self::profiled(name, NodeKind::Binary, profile)
    }

    fn profiled(name: impl Into<String>, kind: NodeKind, profile: Profile) -> Self {
        Self {
            name: name.into(),
            kind,
            profile: Some(profile),
        }
    }

    /// Stable task id, e.g. `fragment:advanced:app.core` or `tree:app.core`.
    pub fn id(&self) -> String {
        match self.profile {
            Some(profile) => format!("{}:{}:{}", self.kind, profile, self.name),
            None => format!("{}:{}", self.kind, self.name),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids() {
        assert_eq!(NodeKey::tree("app.core").id(), "tree:app.core");
        assert_eq!(
            NodeKey::fragment("app.core", Profile::Advanced).id(),
            "fragment:advanced:app.core"
        );
        assert_eq!(NodeKey::binary("app", Profile::None).to_string(), "binary:none:app");
    }

    #[test]
    fn test_profiles_make_distinct_keys() {
        assert_ne!(
            NodeKey::bundle("a", Profile::None),
            NodeKey::bundle("a", Profile::Whitespace)
        );
    }
}
