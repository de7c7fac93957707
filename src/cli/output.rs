use crate::resolver::{ActionConfig, ResolvedAction, VersionOrigin};
use crate::runtime::{ContractState, PipelineReport, PipelineStatus};

/// Print the resolved action list in human-readable format
pub fn print_plan(actions: &[ResolvedAction]) {
    println!("📋 Provisioning Plan");
    println!("====================");

    if actions.is_empty() {
        println!("Nothing to install.");
        return;
    }

    for action in actions {
        println!("{}", describe_action(action));
    }
}

pub fn describe_action(action: &ResolvedAction) -> String {
    let source = action.source();
    let mut line = format!(
        "  {:>2}. {:<18} {:<8} {}",
        action.order_index() + 1,
        action.kind(),
        source.kind(),
        source.label().unwrap_or("any")
    );

    match action.config() {
        ActionConfig::ContainerRuntime(runtime) => {
            line.push_str(&format!(" [{}]", runtime.name));
            if runtime.version_origin == VersionOrigin::Constraint {
                line.push_str(" (raised for development orchestrator)");
            }
        }
        ActionConfig::ContainerToolkit(toolkit) if toolkit.enable_cdi => {
            line.push_str(" [cdi]");
        }
        ActionConfig::Orchestrator(orchestrator) => {
            line.push_str(&format!(" [{}]", orchestrator.installer));
        }
        _ => {}
    }

    line
}

/// Print a run report in human-readable format
pub fn print_report(report: &PipelineReport) {
    println!();
    println!("🚀 Run {}", report.run_id);
    println!("========================================");

    for planned in &report.planned {
        println!(
            "  📝 {:<22} sha256 {}  ({} side effects)",
            planned.file_name,
            &planned.digest[..planned.digest.len().min(12)],
            planned.side_effects.len()
        );
    }

    for outcome in &report.outcomes {
        let icon = match outcome.state {
            ContractState::AlreadySatisfied => "✔️ ",
            ContractState::Installed => "✅",
            ContractState::PendingReboot => "🔁",
            _ => "❌",
        };
        println!(
            "  {} {:<18} {:<18} {:>6}ms {}",
            icon,
            outcome.kind,
            outcome.state,
            outcome.duration_ms,
            outcome.version.as_deref().unwrap_or("")
        );
        if let Some(error) = &outcome.error {
            println!("       {}", error);
        }
    }

    for kind in &report.skipped {
        println!("  ⏭️  {:<18} skipped", kind);
    }

    println!();
    match report.status {
        PipelineStatus::Succeeded => println!("✅ Stack provisioned in {}ms", report.duration_ms),
        PipelineStatus::PendingReboot => {
            println!("🔁 Reboot the host and run apply again to continue")
        }
        PipelineStatus::Failed => println!("❌ Provisioning failed"),
        PipelineStatus::DryRun => println!("📝 Dry run, nothing was executed"),
    }
}
