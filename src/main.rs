//! Resolves the Cloud Run runtime configuration and prints it.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use envbind::cli::ConfigArgs;
use envbind::config::{write_table, BUILD_PREFIX};
use envbind::runtime::BUILD_SERVICE_VERSION;
use envbind::{Config, RuntimeConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Inspect the environment-bound runtime configuration.
#[derive(Debug, Parser)]
#[command(name = "envbind", version, about)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Prefix for computed keys, overriding the compile-time prefix.
    #[arg(long, value_name = "PREFIX")]
    prefix: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut runtime = RuntimeConfig::default();
    let mut builder = Config::builder("runtime", &mut runtime);
    if let Some(prefix) = &cli.prefix {
        builder = builder.with_prefix(prefix);
    }
    let mut config = cli
        .config
        .apply(builder)
        .build()
        .context("invalid configuration structure")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.config.usage {
        print_usage(&mut out, &config)?;
        return Ok(());
    }

    config.load().context("failed to load configuration")?;
    let snapshot = config.snapshot()?;
    write!(out, "{snapshot}")?;
    Ok(())
}

fn print_usage(out: &mut impl Write, config: &Config<'_>) -> Result<()> {
    let program = std::env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "envbind".to_string());

    writeln!(out, "\nRuntime configuration of {program}:\n")?;
    config.print_usage(out)?;

    writeln!(out, "\nBuild-time configuration of {program}:\n")?;
    write_table(
        out,
        &["VARIABLE", "VALUE"],
        [
            ["ENVBIND_PREFIX", BUILD_PREFIX.unwrap_or_default()],
            ["ENVBIND_SERVICE_VERSION", BUILD_SERVICE_VERSION.unwrap_or_default()],
        ],
    )?;
    Ok(())
}
