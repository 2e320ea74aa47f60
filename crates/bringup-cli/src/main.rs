//! bringup — declarative Hadoop cluster bring-up.
//!
//! # Usage
//!
//! ```text
//! bringup apply --config cluster.yaml --trial
//! bringup check --config cluster.yaml
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use bringup_api::HttpControlPlane;
use bringup_engine::Orchestrator;
use bringup_spec::ClusterSpec;

#[derive(Parser)]
#[command(
    name = "bringup",
    about = "Converge a Hadoop cluster toward a declarative cluster document",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Converge the cluster toward the document's declared state.
    ///
    /// Safe to re-run: stages that already converged are skipped, so a
    /// failed run is fixed by fixing the cause and applying again.
    Apply {
        /// Path to the cluster document.
        #[arg(short, long, default_value = "cluster.yaml")]
        config: PathBuf,

        /// Begin a trial license when none is installed.
        #[arg(long)]
        trial: bool,

        /// License file to install when none is present.
        #[arg(long, value_name = "FILE")]
        license: Option<PathBuf>,

        /// Emit logs as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Parse and validate a cluster document without contacting the
    /// control plane.
    Check {
        /// Path to the cluster document.
        #[arg(short, long, default_value = "cluster.yaml")]
        config: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,bringup=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Apply {
            config,
            trial,
            license,
            json,
        } => apply(&config, trial, license.as_deref(), json).await,
        Command::Check { config } => check(&config),
    }
}

async fn apply(
    config: &std::path::Path,
    trial: bool,
    license: Option<&std::path::Path>,
    json: bool,
) -> anyhow::Result<()> {
    init_tracing(json);

    let spec = ClusterSpec::from_file(config)
        .with_context(|| format!("loading cluster document {}", config.display()))?;
    let license = license
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("reading license file {}", path.display()))
        })
        .transpose()?;

    let api = HttpControlPlane::from_cm_config(&spec.cm)
        .context("building control-plane client")?;
    info!(
        cluster = %spec.cluster.name,
        cm = %spec.cm.host,
        "applying cluster document"
    );

    Orchestrator::new(&api, &spec)
        .with_trial(trial)
        .with_license(license)
        .run()
        .await?;
    Ok(())
}

fn check(config: &std::path::Path) -> anyhow::Result<()> {
    let spec = ClusterSpec::from_file(config)
        .with_context(|| format!("loading cluster document {}", config.display()))?;

    println!("cluster:  {} ({})", spec.cluster.name, spec.cluster.full_version);
    println!("hosts:    {}", spec.cluster.hosts.len());
    for parcel in &spec.parcels {
        println!("parcel:   {}-{}", parcel.product, parcel.version);
    }
    let services: Vec<&str> = spec.services.keys().map(String::as_str).collect();
    println!("services: {}", services.join(", "));
    println!("ok");
    Ok(())
}
