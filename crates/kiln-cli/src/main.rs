//! Kiln CLI - profile-aware builds for ClojureScript projects.

mod build;
mod colors;
mod plan;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kiln_core::{Profile, RunnerKind};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Profile-aware build tool for ClojureScript projects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run as if started in this directory
    #[arg(short = 'C', long = "directory", global = true, default_value = ".")]
    directory: PathBuf,
}

/// Overrides for the manifest's `[build]` settings.
#[derive(clap::Args, Clone)]
pub struct BuildArgs {
    /// Also build under this profile (repeatable)
    #[arg(short, long = "profile")]
    pub profiles: Vec<Profile>,

    /// Compiler runner: worker, nailgun or standalone
    #[arg(long)]
    pub runner: Option<RunnerKind>,

    /// Maximum number of tasks running at once
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every module and binary
    Build {
        #[command(flatten)]
        args: BuildArgs,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build one binary and everything it needs
    Bundle {
        /// Name of the [[binary]] to emit
        binary: String,

        #[command(flatten)]
        args: BuildArgs,
    },

    /// Print the task plan as JSON without running anything
    Plan {
        #[command(flatten)]
        args: BuildArgs,
    },

    /// Print the encoded compiler options of a module
    Options {
        /// Module name
        module: String,

        /// Profile to resolve the options for
        #[arg(short, long, default_value = "advanced")]
        profile: Profile,
    },

    /// Encode a JSON value as a compiler option literal
    Encode {
        /// JSON value, e.g. '{":optimizations": ":advanced"}'
        json: String,
    },

    /// Remove all build artifacts
    Clean,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format kiln-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(kiln_err) = err.downcast_ref::<kiln_core::Error>() {
            anyhow::anyhow!("{}", kiln_err.with_hint())
        } else {
            err
        }
    };

    let dir = &cli.directory;
    match cli.command {
        Commands::Build { args, json } => build::execute(dir, &args, json).map_err(format_error)?,

        Commands::Bundle { binary, args } => {
            build::bundle(dir, &binary, &args).map_err(format_error)?;
        }

        Commands::Plan { args } => plan::execute(dir, &args).map_err(format_error)?,

        Commands::Options { module, profile } => {
            plan::options(dir, &module, profile).map_err(format_error)?;
        }

        Commands::Encode { json } => {
            let value: kiln_core::ConfigValue = serde_json::from_str(&json)?;
            println!("{}", kiln_core::encode(&value));
        }

        Commands::Clean => build::clean(dir).map_err(format_error)?,
    }

    Ok(())
}
