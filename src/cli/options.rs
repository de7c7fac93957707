use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Resolve and provision a layered GPU software stack on this host
#[derive(Parser)]
#[command(name = "gpu-stack")]
#[command(about = "Provision kernel, GPU driver, container runtime, toolkit and Kubernetes from one spec")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct GpuStackCli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the spec and print the ordered action list
    Plan {
        /// Stack spec (YAML or JSON)
        spec: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write one payload script per action
    Render {
        /// Stack spec (YAML or JSON)
        spec: PathBuf,
        /// Directory for the rendered scripts
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Executor config supplying state dir and retry policy
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Provision this host
    Apply(ApplyOptions),
}

#[derive(Parser, Debug, Clone)]
pub struct ApplyOptions {
    /// Stack spec (YAML or JSON)
    pub spec: PathBuf,

    /// Executor config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for install-state markers
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Per-action timeout in seconds, 0 disables it
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Let kernel and driver payloads reboot the host
    #[arg(long)]
    pub allow_reboot: bool,

    /// Materialize payloads and report without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Output format for the run report
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
