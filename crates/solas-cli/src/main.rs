//! Solas CLI - pull charts, release assets, archives and repositories

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use solas_pull::{CancellationToken, PullMethod, SolasConfig};

mod commands;
mod display;
mod error;
mod exit_codes;

use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "solas")]
#[command(author = "Solas Contributors")]
#[command(version)]
#[command(about = "Pull Helm charts, GitHub releases, archives and Git repositories", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ~/.config/solas/config.yaml)
    #[arg(long, global = true, env = "SOLAS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull a single artifact
    #[command(disable_version_flag = true)]
    Pull {
        /// Pull method (helm-chart, github-release, http-archive, git)
        #[arg(value_parser = parse_method)]
        method: PullMethod,

        /// Artifact name, used as the destination directory
        #[arg(long)]
        name: String,

        /// Directory the artifact is installed under
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Archive or Git URL
        #[arg(long, default_value = "")]
        url: String,

        /// Chart repository, OCI reference or GitHub owner/repo
        #[arg(long, default_value = "")]
        repository: String,

        /// Version to pull (latest when empty)
        #[arg(long, default_value = "")]
        version: String,

        /// Git branch
        #[arg(long, default_value = "")]
        branch: String,

        /// Git tag or GitHub release tag
        #[arg(long, default_value = "")]
        tag: String,

        /// Git commit hash
        #[arg(long, default_value = "")]
        commit: String,

        /// GitHub release asset name
        #[arg(long, default_value = "")]
        asset: String,

        /// Keep only this subdirectory of a Git checkout
        #[arg(long, default_value = "")]
        sub_dir: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pull every artifact listed in a YAML file
    PullFile {
        /// YAML list of artifacts
        file: PathBuf,

        /// Method for entries that do not name one
        #[arg(long, value_parser = parse_method)]
        method: Option<PullMethod>,

        /// Base directory for entries that do not name one
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Vendor a jsonnet dependency into a jsonnet-bundler project
    Vendor {
        /// Dependency, e.g. github.com/grafana/jsonnet-libs/grafana-builder@master
        dependency: String,

        /// Project directory containing jsonnetfile.json
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Vendor directory relative to the project
        #[arg(long)]
        jsonnet_home: Option<String>,
    },
}

fn parse_method(s: &str) -> std::result::Result<PullMethod, String> {
    s.parse().map_err(|e: solas_pull::PullError| e.to_string())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var("SOLAS_LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<SolasConfig> {
    let config = match path {
        Some(path) => SolasConfig::load_from(path),
        None => SolasConfig::load(),
    };
    config.map_err(|e| CliError::Config {
        message: e.to_string(),
        help: Some("see `solas --help` for the configuration file location".to_string()),
    })
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Pull {
            method,
            name,
            base_dir,
            url,
            repository,
            version,
            branch,
            tag,
            commit,
            asset,
            sub_dir,
            json,
        } => {
            let base_dir = commands::pull::base_dir(base_dir, &config);
            let artifact = solas_pull::Artifact::new(name, base_dir)
                .with_url(url)
                .with_repository(repository)
                .with_version(version)
                .with_branch(branch)
                .with_tag(tag)
                .with_commit_hash(commit)
                .with_asset_name(asset)
                .with_sub_dir(sub_dir);
            commands::pull::run(&cancel, &config, method, &artifact, json).await
        }

        Commands::PullFile {
            file,
            method,
            base_dir,
            json,
        } => commands::pull::run_file(&cancel, &config, &file, method, base_dir, json).await,

        Commands::Vendor {
            dependency,
            dir,
            jsonnet_home,
        } => commands::vendor::run(&cancel, &config, &dependency, &dir, jsonnet_home).await,
    }
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::internal(format!("Failed to create runtime: {}", e)))
        .and_then(|runtime| {
            runtime.block_on(async {
                let cancel = CancellationToken::new();
                let on_interrupt = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::warn!("Interrupted, cleaning up");
                        on_interrupt.cancel();
                    }
                });
                run(cli, cancel).await
            })
        });

    if let Err(e) = result {
        let code = e.exit_code();
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(code);
    }
}
