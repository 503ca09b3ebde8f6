//! Plan and option inspection commands for Kiln CLI.

use std::path::Path;

use kiln_core::{Profile, encode};

use crate::BuildArgs;
use crate::build::open_project;

/// Print the task plan as JSON.
pub fn execute(dir: &Path, args: &BuildArgs) -> anyhow::Result<()> {
    let project = open_project(dir, args)?;
    println!("{}", project.plan()?.to_json()?);
    Ok(())
}

/// Print the encoded options `module` is compiled with under `profile`.
pub fn options(dir: &Path, module: &str, profile: Profile) -> anyhow::Result<()> {
    let project = open_project(
        dir,
        &BuildArgs {
            profiles: Vec::new(),
            runner: None,
            jobs: None,
        },
    )?;
    let decl = project
        .manifest
        .module(module)
        .ok_or_else(|| anyhow::anyhow!("no [[module]] named '{}'", module))?;
    println!("{}", encode(&project.compiler().module_options(decl, profile)));
    Ok(())
}
