//! Build configuration.
//!
//! One explicit [`BuildConfig`] value is handed to the graph, the compiler
//! and the executor. Nothing reads process-wide flags after construction.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths::BuildDirs;
use crate::profile::Profile;

/// Environment variable that overrides the configured runner.
pub const COMPILER_TYPE_ENV: &str = "KILN_COMPILER_TYPE";

/// How the compiler process is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    /// Persistent worker client that receives the classpath.
    Worker,
    /// Nailgun client talking to a warm JVM.
    Nailgun,
    /// A fresh JVM per invocation.
    #[default]
    Standalone,
}

impl RunnerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Nailgun => "nailgun",
            Self::Standalone => "standalone",
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RunnerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "worker" => Ok(Self::Worker),
            "nailgun" => Ok(Self::Nailgun),
            "standalone" => Ok(Self::Standalone),
            other => Err(Error::Toolchain(format!(
                "unknown compiler type '{}' (expected worker, nailgun or standalone)",
                other
            ))),
        }
    }
}

/// Settings from the `[build]` table of `kiln.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Runner used for module compiles. Binaries always run standalone.
    pub runner: RunnerKind,

    /// JVM launcher for the standalone runner.
    pub java: PathBuf,

    /// Persistent worker client.
    pub worker: PathBuf,

    /// Nailgun client.
    pub nailgun: PathBuf,

    /// Main class started by the standalone runner.
    pub main_class: String,

    /// Script the compiler entry point runs.
    pub compile_script: PathBuf,

    /// Compiler classpath appended after the module's own entries.
    pub classpath: Vec<PathBuf>,

    /// Modules every non-bootstrap module depends on implicitly.
    pub implicit_deps: Vec<String>,

    /// Profiles to build besides those the binaries need.
    pub profiles: Vec<Profile>,

    /// When false, only virtual trees are assembled.
    pub compilation_enabled: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            runner: RunnerKind::Standalone,
            java: PathBuf::from("java"),
            worker: PathBuf::from("kiln-worker"),
            nailgun: PathBuf::from("ng"),
            main_class: "clojure.main".to_string(),
            compile_script: PathBuf::from("tools/compile_cljs.clj"),
            classpath: Vec::new(),
            implicit_deps: Vec::new(),
            profiles: Vec::new(),
            compilation_enabled: true,
        }
    }
}

impl BuildConfig {
    /// Apply the `KILN_COMPILER_TYPE` override, if set.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(COMPILER_TYPE_ENV) {
            let value = value.trim();
            if !value.is_empty() {
                self.runner = value.parse()?;
                tracing::debug!("Runner overridden by {}: {}", COMPILER_TYPE_ENV, self.runner);
            }
        }
        Ok(self)
    }

    pub fn with_runner(mut self, runner: RunnerKind) -> Self {
        self.runner = runner;
        self
    }

    /// Resolve relative script and classpath entries against the project
    /// root. Program names without a directory are left for `PATH` lookup.
    pub fn resolved(mut self, dirs: &BuildDirs) -> Self {
        self.compile_script = dirs.resolve(&self.compile_script);
        self.classpath = self.classpath.iter().map(|p| dirs.resolve(p)).collect();
        for program in [&mut self.java, &mut self.worker, &mut self.nailgun] {
            if program.components().count() > 1 {
                *program = dirs.resolve(program);
            }
        }
        self
    }
}
