use std::sync::Arc;

use surge_core::runner::{HostAddress, RunSettings};

use crate::cli::{RunArgs, ValidateArgs};
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;
use crate::scenario_yaml::{LoadedScenario, load_scenario_yaml};

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let loaded = load_scenario_yaml(&args.scenario)
        .await
        .map_err(RunError::InvalidInput)?;

    let host = HostAddress::new(&args.host)
        .map_err(|e| RunError::InvalidInput(anyhow::Error::new(e).context("invalid --host")))?;

    let mut settings = RunSettings::new(host.clone());
    settings.request_timeout = Some(args.timeout);
    settings.control_interval = args.control_interval;
    settings.grace_period = args.grace_period;

    let out = output::formatter(args.output);
    out.print_header(&loaded, &host);

    let LoadedScenario {
        profile, scenario, ..
    } = loaded;
    let summary =
        surge_core::runner::run_profile(&profile, Arc::new(scenario), settings, out.progress())
            .await?;

    out.print_summary(&summary)
        .map_err(|e| RunError::RuntimeError(e.context("failed to print summary")))?;

    Ok(ExitCode::from_run_outcome(
        summary.checks_failed > 0,
        summary.missed_arrivals_total > 0,
    ))
}

pub async fn validate(args: ValidateArgs) -> Result<(), RunError> {
    let loaded = load_scenario_yaml(&args.scenario)
        .await
        .map_err(RunError::InvalidInput)?;

    println!(
        "{}: ok ({} for {}, up to {} workers, {} checks)",
        loaded.name,
        loaded.profile.kind(),
        humantime::format_duration(loaded.profile.total_duration()),
        loaded.profile.max_workers(),
        loaded.scenario.checks().len()
    );
    Ok(())
}
