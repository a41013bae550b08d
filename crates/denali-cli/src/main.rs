#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use denali_config::Environment;
use denali_engine::{Project, ProjectOptions, WatchOptions};
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "denali", about = "Build Denali apps and addons")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the project once
    Build {
        #[command(flatten)]
        flags: BuildFlags,
    },
    /// Build, then rebuild whenever sources change
    Watch {
        #[command(flatten)]
        flags: BuildFlags,
        /// Milliseconds between checks for changes
        #[arg(long, default_value_t = 100)]
        interval: u64,
    },
    /// Check dependencies for known vulnerabilities
    Audit,
}

#[derive(Debug, Args)]
struct BuildFlags {
    /// Output directory, relative to the project
    #[arg(long, short = 'o', default_value = "dist")]
    output: PathBuf,
    /// Target environment: development, test, or production
    #[arg(long, short = 'e', default_value_t = Environment::Development)]
    environment: Environment,
    /// Print the slowest build steps
    #[arg(long)]
    print_slow_trees: bool,
    /// Check dependencies for known vulnerabilities after building
    #[arg(long)]
    audit: bool,
    /// Ask build hooks to lint
    #[arg(long)]
    lint: bool,
    /// For an addon, build its dummy app under test/dummy
    #[arg(long)]
    dummy: bool,
}

impl BuildFlags {
    fn project_options(&self, dir: &Path) -> ProjectOptions {
        ProjectOptions {
            dir: dir.to_path_buf(),
            environment: self.environment,
            print_slow_trees: self.print_slow_trees,
            lint: self.lint,
            audit: self.audit,
            build_dummy: self.dummy,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Build { flags } => cmd_build(&flags),
        Command::Watch { flags, interval } => cmd_watch(&flags, interval),
        Command::Audit => cmd_audit(),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        process::exit(1);
    }
}

/// The project root is the current directory, which must hold a `package.json`.
fn project_root() -> Result<PathBuf, Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    if !cwd.join("package.json").is_file() {
        return Err("no package.json found in current directory".into());
    }
    Ok(cwd)
}

/// Release the build's temp directory when interrupted or terminated.
fn install_interrupt_handler(project: &Project) -> CliResult {
    let handle = project.cleanup_handle();
    ctrlc::set_handler(move || {
        if let Err(e) = handle.release() {
            eprintln!("warning: {e}");
        }
        process::exit(1);
    })?;
    Ok(())
}

fn cmd_build(flags: &BuildFlags) -> CliResult {
    let root = project_root()?;
    let project = Project::new(flags.project_options(&root))?;
    install_interrupt_handler(&project)?;
    tracing::debug!(environment = %flags.environment, "starting build");
    project.build(&flags.output)?;
    Ok(())
}

fn cmd_watch(flags: &BuildFlags, interval: u64) -> CliResult {
    let root = project_root()?;
    let project = Project::new(flags.project_options(&root))?;
    install_interrupt_handler(&project)?;

    let mut options = WatchOptions::new(&flags.output);
    options.interval = Duration::from_millis(interval);
    eprintln!("    Watching {} for changes", project.pkg().name);
    project.watch(options)?;
    Ok(())
}

fn cmd_audit() -> CliResult {
    let root = project_root()?;
    let project = Project::new(ProjectOptions::new(&root))?;
    let found = project.audit_package()?;
    if found.is_empty() {
        eprintln!("    Audited {}: no known vulnerabilities", project.pkg().name);
    }
    Ok(())
}
