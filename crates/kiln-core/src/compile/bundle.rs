//! Final bundle emission.

use std::path::{Path, PathBuf};

use crate::artifact::TransitiveBundle;
use crate::config::RunnerKind;
use crate::error::{Error, Result};
use crate::module::BinaryDecl;
use crate::options::encode;
use crate::paths::publish;

use super::module::Compiler;
use super::runner::Invocation;

impl Compiler {
    /// Command line for emitting `binary` from the entry module's bundle.
    ///
    /// Always uses the standalone runner; persistent workers only serve
    /// module compiles.
    pub fn binary_invocation(
        &self,
        binary: &BinaryDecl,
        bundle_dir: &Path,
        scratch: &Path,
        output: &Path,
    ) -> Invocation {
        let mut classpath = vec![bundle_dir.to_path_buf(), scratch.to_path_buf()];
        classpath.extend(self.config().classpath.iter().cloned());

        Invocation::for_runner(RunnerKind::Standalone, self.config(), &classpath)
            .path_arg(&self.config().compile_script)
            .arg(encode(&binary.resolved_options()))
            .path_arg(output)
            .path_arg(bundle_dir)
    }

    /// Compile the deployable output of `binary`.
    ///
    /// Returns the path of the emitted output inside the binary's directory.
    pub fn emit_binary(&self, binary: &BinaryDecl, bundle: &TransitiveBundle) -> Result<PathBuf> {
        if bundle.module != binary.module {
            return Err(Error::UnresolvedDependency {
                module: binary.name.clone(),
                dependency: binary.module.clone(),
            });
        }
        if bundle.profile != binary.profile {
            return Err(Error::ProfileMismatch {
                module: bundle.module.clone(),
                expected: binary.profile,
                found: bundle.profile,
            });
        }
        if !bundle.dir.is_dir() {
            return Err(Error::MissingArtifact(bundle.dir.clone()));
        }

        let dirs = self.dirs();
        let staging = dirs.staging("binary-")?;
        let scratch = dirs.staging("scratch-")?;
        let output = staging.path().join(binary.output_name());
        let invocation = self.binary_invocation(binary, &bundle.dir, scratch.path(), &output);

        tracing::info!("Emitting {} [{}]", binary.name, binary.profile);
        super::run(&invocation, &binary.name, binary.profile)?;
        drop(scratch);

        let out = dirs.binary_dir(&binary.name, binary.profile);
        publish(staging, &out)?;
        Ok(out.join(binary.output_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::paths::BuildDirs;
    use crate::profile::Profile;

    #[test]
    fn test_binary_invocation_is_standalone() {
        let config = BuildConfig {
            runner: RunnerKind::Worker,
            ..Default::default()
        };
        let compiler = Compiler::new(config, BuildDirs::new("/project"));
        let binary = BinaryDecl::new("app", "app.core", "app.core").with_profile(Profile::Whitespace);

        let invocation = compiler.binary_invocation(
            &binary,
            Path::new("/bundle"),
            Path::new("/scratch"),
            Path::new("/out/app"),
        );

        assert_eq!(invocation.program, PathBuf::from("java"));
        assert_eq!(
            invocation.args,
            vec![
                "-cp",
                "/bundle:/scratch",
                "clojure.main",
                "tools/compile_cljs.clj",
                "{:final-output true :main \"app.core\" :optimizations :whitespace :source-map true}",
                "/out/app",
                "/bundle",
            ]
        );
    }

    #[test]
    fn test_bundle_profile_must_match() {
        let temp = tempfile::TempDir::new().unwrap();
        let dirs = BuildDirs::create(temp.path()).unwrap();
        let compiler = Compiler::new(BuildConfig::default(), dirs);
        let binary = BinaryDecl::new("app", "app.core", "app.core");
        let bundle = TransitiveBundle::new("app.core", Profile::None, temp.path());

        let err = compiler.emit_binary(&binary, &bundle).unwrap_err();
        assert!(matches!(err, Error::ProfileMismatch { .. }));
    }
}
