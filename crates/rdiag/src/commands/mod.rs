//! CLI command implementations.

mod convert;
mod setup;
mod validate;

use std::path::Path;
use std::time::{Duration, Instant};

use rdiag_config::{CliSettings, Config};
use rdiag_diagrams::{DiagramFormat, PlantUmlRenderer, ResilientProcessor};

use crate::Cli;
use crate::error::CliError;
use crate::output::Output;

/// Run the command selected by the flags.
///
/// Returns whether every diagram (or the setup) checked out.
///
/// # Errors
///
/// Returns an error for invalid configuration, a missing or unsupported
/// input, or I/O failures on the document and error log.
pub(crate) fn execute(cli: Cli, output: &Output) -> Result<bool, CliError> {
    let cli_settings = CliSettings {
        format: cli.format,
        max_retries: cli.max_retries,
        timeout_secs: cli.timeout,
        output_dir: cli.output_dir,
    };
    let config = Config::load(cli.config.as_deref(), Some(&cli_settings))?;
    if let Some(path) = &config.config_path {
        tracing::info!("using config {}", path.display());
    }

    let renderer = build_renderer(&config);
    if cli.check_setup {
        return Ok(setup::run(&renderer, output));
    }

    let Some(input) = cli.input else {
        return Err(CliError::Validation("no input file given".to_owned()));
    };
    let mut processor = build_processor(&config, renderer)?;
    if let Some(secs) = cli.time_limit {
        processor = processor.deadline(Instant::now() + Duration::from_secs(secs));
    }

    if cli.validate_only {
        validate::run(&processor, &input, output)
    } else {
        convert::run(&mut processor, &input, &config.output.rewrite_suffix, output)
    }
}

fn build_renderer(config: &Config) -> PlantUmlRenderer {
    PlantUmlRenderer::discover(
        config.render.plantuml_command.as_deref().map(Path::new),
        config.render.plantuml_jar.as_deref().map(Path::new),
    )
    .timeout(config.render.timeout())
}

fn build_processor(
    config: &Config,
    renderer: PlantUmlRenderer,
) -> Result<ResilientProcessor<PlantUmlRenderer>, CliError> {
    let format = DiagramFormat::parse(&config.render.format).ok_or_else(|| {
        CliError::Validation(format!("unsupported format '{}'", config.render.format))
    })?;

    let mut processor = ResilientProcessor::new(renderer)
        .format(format)
        .max_attempts(config.render.max_retries)
        .diagrams_dir_name(config.output.diagrams_dir.clone())
        .references_dir(config.references_resolved.dir.clone())
        .troubleshooting_dir(config.references_resolved.troubleshooting_dir.clone());
    if let Some(base_dir) = &config.base_dir_resolved {
        processor = processor.base_dir(base_dir.clone());
    }
    Ok(processor)
}
