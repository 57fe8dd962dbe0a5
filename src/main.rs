mod activate;
mod author;
mod checksum;
mod cli;
mod deactivate;
mod discover;
mod header;
mod plan;

use cli::{Cli, Command};
use deactivate::VcsBackend;
use header::Header;
use plan::TransitionPlan;
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Event, Level, Subscriber, error, info};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

struct NgExitCode;

impl NgExitCode {
    /// Exit code used for fatal errors (bad headers, checksum mismatches,
    /// I/O failures).
    fn any_error() -> ExitCode {
        ExitCode::from(1)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Change working directory if -C was specified
    if let Some(directory) = cli.directory
        && let Err(e) = std::env::set_current_dir(&directory)
    {
        error!(
            "Failed to change directory to {}: {}",
            directory.display(),
            e
        );
        return NgExitCode::any_error();
    }

    let result: anyhow::Result<()> = match cli.command {
        Some(Command::Activate) => handle_activate(true),
        Some(Command::Reactivate) => handle_activate(false),
        Some(Command::Deactivate { secondary_repo }) => {
            handle_deactivate(secondary_repo.as_deref())
        }
        Some(Command::Sum { files }) => handle_sum(&files),
        Some(Command::Ngize { files, header }) => handle_ngize(&files, header.as_deref()),
        None => {
            println!("nothing to do");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            NgExitCode::any_error()
        }
    }
}

/// Parses every discovered shadow file before anything is mutated.
fn read_all_headers() -> anyhow::Result<Vec<Header>> {
    let shadow_files = discover::discover_shadow_files(Path::new("."))?;
    let mut headers = Vec::with_capacity(shadow_files.len());
    for path in shadow_files {
        info!("reading {}", path.display());
        headers.push(header::parse_header(&path)?);
    }
    Ok(headers)
}

fn handle_activate(initial: bool) -> anyhow::Result<()> {
    let headers = read_all_headers()?;
    // Initial activation verifies checksums and removes legacy files;
    // reactivation does neither.
    let plan = plan::plan_transition(&headers, initial, initial)?;

    info!("finished reading info; now execute");
    let outcome = activate::run_activate(&plan, initial)?;

    info!(
        "deleted {}, installed {}, up to date {}",
        outcome.deleted, outcome.installed, outcome.up_to_date
    );
    Ok(())
}

fn handle_deactivate(secondary_repo: Option<&Path>) -> anyhow::Result<()> {
    let headers = read_all_headers()?;
    // The legacy files are already gone, so plan their removal paths without
    // checksum verification.
    let plan: TransitionPlan = plan::plan_transition(&headers, true, false)?;

    info!("finished reading info; now execute");
    let backend = VcsBackend::detect(Path::new("."));
    deactivate::run_deactivate(&plan, backend, secondary_repo)?;
    Ok(())
}

fn handle_sum(files: &[PathBuf]) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    author::print_sums(files, &mut stdout)?;
    Ok(())
}

fn handle_ngize(files: &[PathBuf], header_template: Option<&Path>) -> anyhow::Result<()> {
    for file in files {
        author::ngize(file, header_template)?;
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = LevelPrefixFormatter { stderr_is_terminal };

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Prefixes each event with its level; colored when stderr is a terminal.
struct LevelPrefixFormatter {
    stderr_is_terminal: bool,
}

impl<S, N> FormatEvent<S, N> for LevelPrefixFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let level = *event.metadata().level();
        if self.stderr_is_terminal {
            let color = match level {
                Level::WARN => "\x1b[33m",
                Level::ERROR => "\x1b[31m",
                _ => "\x1b[2m",
            };
            write!(writer, "{}{}:\x1b[0m ", color, level.as_str())?;
        } else {
            match level {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => writer.write_str("TRACE: ")?,
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
