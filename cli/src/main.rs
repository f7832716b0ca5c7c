use crate::cli::Args;
use anyhow::{Context, bail};
use clap::Parser;
use owlunit::files::{FileLoader, rdf_format_from_name, to_location};
use owlunit::graph::GraphSource;
use owlunit::{CommandReasoner, CommandShapeValidator, Environment, SuiteOptions, run_suite};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

pub fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let suite = to_location(&args.suite)
        .with_context(|| format!("Invalid test suite location {}", args.suite))?;
    let mut options = SuiteOptions::default().with_concurrency(args.jobs);
    if let Some(name) = &args.format {
        let Some(format) = rdf_format_from_name(name) else {
            bail!("The file format '{name}' is unknown")
        };
        options = options.with_format(format);
    }

    let mut loader = FileLoader::new();
    if let Some(timeout) = args.http_timeout {
        loader = loader.with_http_timeout(Duration::from_secs(timeout));
    }
    let mut environment = Environment::new(GraphSource::new(loader));
    if let Some(shapes) = &args.shapes {
        environment = environment.with_shapes(
            to_location(shapes).with_context(|| format!("Invalid shapes location {shapes}"))?,
        );
    }
    if let Some(command) = &args.reasoner {
        let (program, arguments) = split_command(command)?;
        environment = environment.with_reasoner(CommandReasoner::new(program, arguments));
    }
    if let Some(command) = &args.validator {
        let (program, arguments) = split_command(command)?;
        environment = environment.with_validator(CommandShapeValidator::new(program, arguments));
    }

    let report = run_suite(&suite, options, environment)
        .with_context(|| format!("The test suite {suite} can not be run"))?;
    if let Some(path) = &args.earl {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        report
            .write_earl(BufWriter::new(file))
            .and_then(|mut writer| writer.flush())
            .with_context(|| format!("Failed to write the EARL report to {}", path.display()))?;
        info!("EARL report written to {}", path.display());
    }
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Splits a command line on whitespaces into its program and its arguments.
fn split_command(command: &str) -> anyhow::Result<(&str, Vec<&str>)> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("The command '{command}' is empty")
    };
    Ok((program, parts.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_splitting() -> anyhow::Result<()> {
        assert_eq!(
            split_command("java -jar  hermit.jar")?,
            ("java", vec!["-jar", "hermit.jar"])
        );
        assert_eq!(split_command("konclude")?, ("konclude", Vec::new()));
        assert!(split_command("  ").is_err());
        Ok(())
    }
}
