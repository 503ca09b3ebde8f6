//! Compiler process invocation.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{BuildConfig, RunnerKind};
use crate::error::{Error, Result};
use crate::options::shell_quote;

/// Class name the nailgun server runs for compiles.
const NAILGUN_ENTRY: &str = "PersistentClj";

/// A fully specified compiler command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    /// Start an invocation of `kind` with the given classpath.
    pub fn for_runner(kind: RunnerKind, config: &BuildConfig, classpath: &[PathBuf]) -> Self {
        let classpath = join_classpath(classpath);
        match kind {
            RunnerKind::Worker => Self {
                program: config.worker.clone(),
                args: vec![classpath],
            },
            RunnerKind::Nailgun => Self {
                program: config.nailgun.clone(),
                args: vec![NAILGUN_ENTRY.to_string(), classpath],
            },
            RunnerKind::Standalone => Self {
                program: config.java.clone(),
                args: vec!["-cp".to_string(), classpath, config.main_class.clone()],
            },
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// The command line with every word quoted for a POSIX shell.
    pub fn shell_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .map(|word| shell_word(&word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build a `Command`, locating the program on `PATH` if needed.
    pub fn to_command(&self) -> Result<Command> {
        let program = resolve_program(&self.program)?;
        let mut cmd = Command::new(program);
        cmd.args(&self.args);
        Ok(cmd)
    }
}

/// Quote a word only when the shell would otherwise split or expand it.
fn shell_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '=' | ':' | ','));
    if plain {
        word.to_string()
    } else {
        shell_quote(word)
    }
}

fn join_classpath(entries: &[PathBuf]) -> String {
    entries
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

/// Locate a program: paths with a directory are used as-is, bare names are
/// looked up on `PATH`.
pub fn resolve_program(program: &Path) -> Result<PathBuf> {
    if program.components().count() > 1 {
        if program.exists() {
            return Ok(program.to_path_buf());
        }
        return Err(Error::Toolchain(format!(
            "compiler runner '{}' does not exist",
            program.display()
        )));
    }

    which::which(program).map_err(|_| {
        Error::Toolchain(format!("'{}' not found in PATH", program.display()))
    })
}
