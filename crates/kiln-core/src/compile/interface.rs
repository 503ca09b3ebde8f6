//! Interface extraction.
//!
//! Dependents compile against a module's public surface only: its interface
//! descriptor and namespace registry. Internal changes that leave these
//! files byte-identical leave the interface digest unchanged, which is what
//! lets the executor skip recompiling dependents.

use std::fs;

use crate::artifact::{
    CompiledFragment, EXTERNS_FILE, InterfaceArtifact, NAMESPACES_FILE, NamespaceSet,
    is_interface_file,
};
use crate::error::{Error, Result};
use crate::paths::{BuildDirs, publish};
use crate::profile::Profile;

/// Extract the interface of a compiled fragment.
///
/// Copies the interface descriptor and every namespace registry file byte
/// for byte. Nothing else from the fragment is carried over.
pub fn extract(fragment: &CompiledFragment, dirs: &BuildDirs) -> Result<InterfaceArtifact> {
    let descriptor = fragment.dir.join(EXTERNS_FILE);
    if !descriptor.is_file() {
        return Err(Error::MissingArtifact(descriptor));
    }

    let staging = dirs.staging("interface-")?;
    let mut entries: Vec<_> = fs::read_dir(&fragment.dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();
        if !is_interface_file(&name.to_string_lossy()) || !entry.path().is_file() {
            continue;
        }
        fs::copy(entry.path(), staging.path().join(&name))?;
    }

    let out = dirs.interface_dir(&fragment.module, fragment.profile);
    publish(staging, &out)?;

    let interface = InterfaceArtifact::open(&fragment.module, fragment.profile, out)?;
    tracing::debug!("Interface of {} [{}]: {}", interface.module, interface.profile, interface.digest);
    Ok(interface)
}

/// Interface of a bootstrap module: an empty namespace registry and no
/// descriptor.
pub fn bootstrap_interface(module: &str, profile: Profile, dirs: &BuildDirs) -> Result<InterfaceArtifact> {
    let staging = dirs.staging("interface-")?;
    NamespaceSet::new().write(&staging.path().join(NAMESPACES_FILE))?;

    let out = dirs.interface_dir(module, profile);
    publish(staging, &out)?;
    InterfaceArtifact::open(module, profile, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::TRANSITIVE_MANIFEST_FILE;
    use tempfile::TempDir;

    fn fragment(dirs: &BuildDirs, body: &str) -> CompiledFragment {
        let dir = dirs.fragment_dir("app.util", Profile::None);
        fs::create_dir_all(dir.join("app")).unwrap();
        fs::write(dir.join("app/util.js"), body).unwrap();
        fs::write(dir.join(EXTERNS_FILE), "{:externs []}\n").unwrap();
        fs::write(dir.join("all-namespaces.edn"), "app.util\n").unwrap();
        NamespaceSet::from_iter(["app.util"])
            .write(&dir.join(TRANSITIVE_MANIFEST_FILE))
            .unwrap();
        CompiledFragment::new("app.util", Profile::None, dir)
    }

    #[test]
    fn test_extract_copies_public_surface_only() {
        let temp = TempDir::new().unwrap();
        let dirs = BuildDirs::create(temp.path()).unwrap();

        let interface = extract(&fragment(&dirs, "var a = 1;"), &dirs).unwrap();

        let mut names: Vec<_> = fs::read_dir(&interface.dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["all-namespaces.edn", "deps.cljs"]);
        assert_eq!(
            fs::read_to_string(interface.dir.join("all-namespaces.edn")).unwrap(),
            "app.util\n"
        );
    }

    #[test]
    fn test_internal_change_keeps_digest() {
        let temp = TempDir::new().unwrap();
        let dirs = BuildDirs::create(temp.path()).unwrap();

        let before = extract(&fragment(&dirs, "var a = 1;"), &dirs).unwrap();
        let after = extract(&fragment(&dirs, "var a = 2; var b = 3;"), &dirs).unwrap();
        assert_eq!(before.digest, after.digest);
    }

    #[test]
    fn test_public_change_changes_digest() {
        let temp = TempDir::new().unwrap();
        let dirs = BuildDirs::create(temp.path()).unwrap();

        let frag = fragment(&dirs, "var a = 1;");
        let before = extract(&frag, &dirs).unwrap();
        fs::write(frag.dir.join("all-namespaces.edn"), "app.util\napp.util.extra\n").unwrap();
        let after = extract(&frag, &dirs).unwrap();
        assert_ne!(before.digest, after.digest);
    }

    #[test]
    fn test_missing_descriptor() {
        let temp = TempDir::new().unwrap();
        let dirs = BuildDirs::create(temp.path()).unwrap();
        let frag = fragment(&dirs, "var a = 1;");
        fs::remove_file(frag.dir.join(EXTERNS_FILE)).unwrap();

        assert!(matches!(extract(&frag, &dirs), Err(Error::MissingArtifact(_))));
    }

    #[test]
    fn test_bootstrap_interface() {
        let temp = TempDir::new().unwrap();
        let dirs = BuildDirs::create(temp.path()).unwrap();

        let interface = bootstrap_interface("goog", Profile::Advanced, &dirs).unwrap();
        assert_eq!(interface.profile, Profile::Advanced);
        assert!(NamespaceSet::read(&interface.dir.join(NAMESPACES_FILE)).unwrap().is_empty());
        assert!(!interface.dir.join(EXTERNS_FILE).exists());
    }
}
