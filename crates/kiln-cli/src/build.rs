//! Build commands for Kiln CLI.
//!
//! Builds the whole project or a single binary, reporting what ran and
//! what was reused from earlier builds.

use std::path::Path;
use std::time::Instant;

use kiln_core::{BuildReport, Executor, Project};

use crate::BuildArgs;
use crate::colors;

/// Open the project containing `dir` with command-line overrides applied.
pub fn open_project(dir: &Path, args: &BuildArgs) -> anyhow::Result<Project> {
    let dir = std::fs::canonicalize(dir)?;
    let project = Project::open(&dir)?;

    let mut config = project.config.clone();
    for profile in &args.profiles {
        if !config.profiles.contains(profile) {
            config.profiles.push(*profile);
        }
    }
    if let Some(runner) = args.runner {
        config = config.with_runner(runner);
    }
    Ok(project.with_config(config))
}

/// Build every module and binary.
pub fn execute(dir: &Path, args: &BuildArgs, json: bool) -> anyhow::Result<()> {
    let start = Instant::now();
    let project = open_project(dir, args)?;
    let executor = with_jobs(project.executor()?, args);

    let report = executor.run()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, start);
    }
    Ok(())
}

/// Build one binary and what it needs.
pub fn bundle(dir: &Path, binary: &str, args: &BuildArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let project = open_project(dir, args)?;
    let executor = with_jobs(project.binary_executor(binary)?, args);

    let report = executor.run()?;
    print_summary(&report, start);
    Ok(())
}

/// Remove the project's build directory.
pub fn clean(dir: &Path) -> anyhow::Result<()> {
    let dir = std::fs::canonicalize(dir)?;
    let project = Project::open(&dir)?;
    project.dirs.clean()?;
    println!("{}Removed{} {}", colors::GREEN, colors::RESET, project.dirs.kiln_dir.display());
    Ok(())
}

fn with_jobs(executor: Executor, args: &BuildArgs) -> Executor {
    match args.jobs {
        Some(jobs) => executor.with_jobs(jobs),
        None => executor,
    }
}

fn print_summary(report: &BuildReport, start: Instant) {
    if !report.skipped.is_empty() {
        println!(
            "{}Compilation disabled:{} skipped {} tasks",
            colors::YELLOW,
            colors::RESET,
            report.skipped.len()
        );
    }
    for binary in &report.binaries {
        println!("{}Emitted{} {}", colors::BOLD, colors::RESET, binary.display());
    }
    println!(
        "{}Finished{} {} tasks run, {} up to date {}in {:.2}s{}",
        colors::GREEN,
        colors::RESET,
        report.executed.len(),
        report.cached.len(),
        colors::DIM,
        start.elapsed().as_secs_f64(),
        colors::RESET
    );
}
