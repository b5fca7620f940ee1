//! go-bfuzz-build entry point.
//!
//! Wraps one fuzz entry function of a Go library package in a cgo harness
//! and compiles it into a static archive for a native fuzzing engine.

mod driver;
mod resolver;
#[cfg(all(test, unix))]
mod testutil;

use anyhow::{Context, Result};
use bfuzz_common::{split_list, BfuzzError, BuildConfig, HarnessMode};
use clap::Parser;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::driver::BuildDriver;

/// Environment variable naming a configuration file.
const CONFIG_ENV: &str = "BFUZZ_CONFIG_PATH";

/// Environment variable naming the go command.
const GO_ENV: &str = "GO";

/// Configuration file picked up from the working directory.
const LOCAL_CONFIG: &str = "bfuzz.toml";

/// go-bfuzz-build command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "go-bfuzz-build",
    about = "Build a Go fuzz entry function into a static archive for native fuzzing engines",
    version,
    long_about = None
)]
struct Args {
    /// Package or module to build (no `...` patterns).
    #[arg(value_name = "PKG", default_value = ".")]
    package: String,

    /// Extra comma-separated build tags.
    #[arg(long, value_name = "LIST")]
    tags: Option<String>,

    /// Output archive (default `<pkgName>-fuzz.a`).
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Entry function (default `Fuzz`, else the only fuzz function).
    #[arg(long = "func", value_name = "NAME")]
    func: Option<String>,

    /// Keep the generated harness and the go work directory.
    #[arg(long)]
    work: bool,

    /// Enable race detection.
    #[arg(long)]
    race: bool,

    /// Print the commands run by the go tool.
    #[arg(short = 'x')]
    print_commands: bool,

    /// Verbose build output.
    #[arg(short = 'v')]
    verbose: bool,

    /// Comma-separated import paths not to instrument.
    #[arg(long, value_name = "LIST")]
    preserve: Option<String>,

    /// Instrument runtime support packages.
    #[arg(long)]
    cover_runtime: bool,

    /// Instrument the generated main package.
    #[arg(long)]
    cover_main: bool,

    /// Export every fuzz function, selected by the first input byte.
    #[arg(long)]
    all: bool,

    /// Skip source discovery and trust the function name.
    #[arg(long)]
    no_discovery: bool,

    /// Print the generated harness instead of building it.
    #[arg(long)]
    print_harness: bool,

    /// Path to a build configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Help and version go to stdout, which may already be closed.
            if let Err(io_err) = err.print() {
                eprintln!("go-bfuzz-build: failed to print usage: {io_err}");
            }
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(&args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Exit status for a failed invocation.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<BfuzzError>()
        .map_or(1, BfuzzError::exit_code)
}

/// Initialize logging on stderr with the specified log level.
fn init_logging(level: &str) {
    let filter = format!("go_bfuzz_build={level},bfuzz_gen={level},bfuzz_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .init();
}

fn run(args: &Args) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting go-bfuzz-build");

    let mut config = load_config(args)?;
    if let Ok(go) = std::env::var(GO_ENV) {
        if !go.is_empty() {
            config.go_binary = go;
        }
    }
    apply_args(&mut config, args);
    info!(
        go = %config.go_binary,
        mode = ?config.mode,
        tags = %config.tag_list(),
        "Configuration loaded"
    );

    let work_dir = std::env::current_dir().context("Failed to determine working directory")?;
    let mut driver = BuildDriver::new(config, work_dir);

    if args.print_harness {
        let prepared = driver.dry_run(&args.package)?;
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(prepared.harness.source.as_bytes())
            .and_then(|()| stdout.flush())
            .context("Failed to print harness")?;
        return Ok(());
    }

    let outcome = driver.run(&args.package)?;
    info!(
        output = %outcome.output.display(),
        functions = ?outcome.selection.functions,
        "Done"
    );
    Ok(())
}

/// Override file configuration with command-line flags.
fn apply_args(config: &mut BuildConfig, args: &Args) {
    if let Some(tags) = &args.tags {
        config.tags = split_list(tags);
    }
    if let Some(preserve) = &args.preserve {
        config.preserve = split_list(preserve);
    }
    if let Some(output) = &args.output {
        config.output = Some(output.clone());
    }
    if let Some(func) = &args.func {
        config.func = Some(func.clone());
    }
    config.work |= args.work;
    config.race |= args.race;
    config.print_commands |= args.print_commands;
    config.verbose |= args.verbose;
    config.cover_runtime |= args.cover_runtime;
    config.cover_main |= args.cover_main;
    if args.all {
        config.mode = HarnessMode::Multi;
    }
    if args.no_discovery {
        config.discovery = false;
    }
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `BFUZZ_CONFIG_PATH` environment variable
/// 3. `bfuzz.toml` in the working directory
/// 4. Built-in defaults
fn load_config(args: &Args) -> Result<BuildConfig> {
    // 1. Command-line argument (highest priority)
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return BuildConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from {CONFIG_ENV}");
            return BuildConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from {CONFIG_ENV}={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "{CONFIG_ENV} set but file does not exist, checking other locations"
        );
    }

    // 3. Working directory
    let local_path = PathBuf::from(LOCAL_CONFIG);
    if local_path.exists() {
        info!(?local_path, "Loading config from working directory");
        return BuildConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {local_path:?}"));
    }

    // 4. Built-in defaults
    info!("No config file found, using built-in defaults");
    Ok(BuildConfig::default())
}
