//! Unifont fetcher CLI entrypoint.
//!
//! This binary downloads a GNU Unifont glyph table with its detached
//! signature and signing key, verifies the signature in a per-run keyring,
//! and unpacks the table only when the signature is good.

use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;
use unifont_fetch::artefact::download::HttpDownloader;
use unifont_fetch::artefact::unpack::GzipUnpacker;
use unifont_fetch::cli::Cli;
use unifont_fetch::command::SystemCommandExecutor;
use unifont_fetch::config::{FetchConfig, default_config_path, file_layer};
use unifont_fetch::error::Result;
use unifont_fetch::output::{DryRunInfo, RunSummary, write_stderr_line};
use unifont_fetch::pipeline::{Capabilities, PipelineConfig, run_pipeline};
use unifont_fetch::signature::gpg::GpgVerifier;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Installs the log backend; `RUST_LOG` overrides the verbosity flags.
fn init_logging(cli: &Cli) {
    let env = env_logger::Env::default().default_filter_or(cli.log_filter());
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let (config, config_file) = resolve_config(cli)?;

    // Dry-run mode: show what would be fetched without side effects
    if cli.dry_run {
        let info = DryRunInfo {
            config: &config,
            config_file: config_file.as_deref(),
        };
        write_stderr_line(stderr, info.display_text());
        return Ok(());
    }

    let executor = SystemCommandExecutor;
    let downloader = HttpDownloader::new(config.timeout);
    let verifier = GpgVerifier::new(&executor, config.gpg_program.clone());
    let caps = Capabilities {
        executor: &executor,
        downloader: &downloader,
        verifier: &verifier,
        unpacker: &GzipUnpacker,
    };

    let pipeline_config = PipelineConfig::from_fetch_config(&config, cli.quiet);
    let summary = run_pipeline(&pipeline_config, &caps, stderr)?;
    report_summary(cli, &summary, stdout, stderr);
    Ok(())
}

/// Merges CLI, configuration file, and defaults.
///
/// Returns the configuration file in effect alongside the settings.
fn resolve_config(cli: &Cli) -> Result<(FetchConfig, Option<Utf8PathBuf>)> {
    let discovered = match &cli.config {
        Some(_) => None,
        None => default_config_path(),
    };
    let in_effect = cli
        .config
        .clone()
        .or_else(|| discovered.clone().filter(|path| path.is_file()));
    let file = file_layer(cli.config.as_deref(), discovered)?;
    let config = FetchConfig::resolve(cli.overrides().over(file))?;
    Ok((config, in_effect))
}

fn report_summary(
    cli: &Cli,
    summary: &RunSummary,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) {
    if cli.json {
        if writeln!(stdout, "{}", summary.to_json()).is_err() {
            // Best-effort output; ignore write failures.
        }
    } else if !cli.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(stderr, summary.display_text());
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            log::debug!("run failed in stage {} ({}): {err:?}", err.stage(), err.kind());
            write_stderr_line(stderr, err.diagnostic());
            1
        }
    }
}
