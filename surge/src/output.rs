use crate::cli::OutputFormat;
use crate::scenario_yaml::LoadedScenario;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, loaded: &LoadedScenario, host: &surge_core::runner::HostAddress);
    fn progress(&self) -> Option<surge_core::runner::ProgressFn>;
    fn print_summary(&self, summary: &surge_core::runner::RunSummary) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
