use anyhow::Result;
use clap::Parser;
use gpu_stack_provisioner::cli::{run_apply, run_plan, run_render, Commands, GpuStackCli};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = GpuStackCli::parse();

    let level = match cli.verbosity {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting gpu-stack v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Plan { spec, format } => run_plan(&spec, format)?,
        Commands::Render {
            spec,
            output_dir,
            config,
        } => {
            run_render(&spec, &output_dir, config.as_deref())?;
        }
        Commands::Apply(options) => {
            let report = run_apply(&options).await?;
            if report.status.is_error() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
