use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tg_cfg::ConfigSet;
use tg_core::defs::{resolve_project, ProjectOverrides, ResolvedProject};
use tg_core::discover::Discovery;
use tg_core::layout::{BuildProject, ProjectLayout};
use tg_core::Runner;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Generate sources from Thrift IDL files with the `thrift` compiler.
#[derive(Debug, Parser)]
#[command(name = "tg", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate sources for the main and test IDL folders of a project.
    Generate {
        /// Path to the thrift compiler, or a name to look up on the PATH.
        #[arg(long, short = 'e')]
        executable: Option<String>,
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// List the IDL files each pass would generate sources from.
    Discover {
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Print every configuration flag and its current value.
    Configs {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

#[derive(Debug, Args)]
struct ProjectArgs {
    /// Root directory of the project.
    #[arg(long, short = 'p', default_value = ".")]
    project_dir: PathBuf,
    /// Main sources directory, IDL files live in a `thrift` folder next to it.
    ///
    /// Relative paths are resolved against the project directory.
    #[arg(long)]
    source_dir: Option<PathBuf>,
    /// Test sources directory, IDL files live in a `thrift` folder next to it.
    ///
    /// Relative paths are resolved against the project directory.
    #[arg(long)]
    test_source_dir: Option<PathBuf>,
    /// Build output directory, generated sources go to `thrift` and `test-thrift` in it.
    ///
    /// Relative paths are resolved against the project directory.
    #[arg(long)]
    build_dir: Option<PathBuf>,
    /// Override a configuration flag, e.g. `--config concurrency=4`.
    #[arg(long = "config", short = 'c', value_name = "NAME=VALUE")]
    configs: Vec<String>,
}

impl ProjectArgs {
    fn resolve(self) -> Result<ResolvedProject, tg_core::Error> {
        let overrides = ProjectOverrides {
            source_dir: self.source_dir,
            test_source_dir: self.test_source_dir,
            build_dir: self.build_dir,
            configs: self.configs,
        };
        resolve_project(&self.project_dir, &overrides, |var| std::env::var(var).ok())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(!tg_ore::env::is_truthy("NO_COLOR"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), anyhow::Error> {
    match cli.command {
        Command::Generate {
            executable,
            project,
        } => {
            let project = project.resolve()?;
            let executable = executable
                .or(project.executable)
                .context("no thrift compiler given, pass --executable or set it in the manifest")?;
            generate(&executable, &project.layout, &project.configs).await
        }
        Command::Discover { project } => {
            let project = project.resolve()?;
            let discovery = Discovery::from_configs(&project.configs)?;
            print_discovered(&discovery, "main", &project.layout.source_idl_dir())?;
            print_discovered(&discovery, "test", &project.layout.test_idl_dir())?;
            Ok(())
        }
        Command::Configs { project } => {
            let project = project.resolve()?;
            print!("{}", project.configs);
            Ok(())
        }
    }
}

async fn generate(
    executable: &str,
    layout: &ProjectLayout,
    configs: &ConfigSet,
) -> Result<(), anyhow::Error> {
    let runner = Runner::from_configs(executable, configs)?;

    let cancel = CancellationToken::new();
    let cancel_ = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping thrift compilers");
            cancel_.cancel();
        }
    });

    let report = runner
        .run(&layout.source_pass(), &layout.test_pass(), &cancel)
        .await
        .context("failed to generate source from IDL")?;

    let mut project = BuildProject::default();
    project.register(&report);
    tracing::info!(files = report.generated(), "generated sources");

    for root in &project.compile_source_roots {
        println!("source root: {}", root.display());
    }
    for root in &project.test_compile_source_roots {
        println!("test source root: {}", root.display());
    }
    Ok(())
}

fn print_discovered(discovery: &Discovery, kind: &str, root: &Path) -> Result<(), anyhow::Error> {
    for idl in discovery.discover(root)? {
        println!("{kind}: {}", idl.display());
    }
    Ok(())
}
