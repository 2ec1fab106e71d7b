//! Release mirror CLI entrypoint.
//!
//! This binary republishes upstream releases that are missing from the
//! mirror package. Progress goes to stderr; `plan` output goes to stdout.

use camino::Utf8PathBuf;
use clap::Parser;
use release_mirror::catalog::{RegistryCatalog, ReleaseCatalog, SourceCatalog};
use release_mirror::cli::{Cli, Command, PlanArgs};
use release_mirror::command::{CommandExecutor, SystemCommandExecutor};
use release_mirror::config::{MirrorConfig, SourceConfig};
use release_mirror::error::{MirrorError, Result};
use release_mirror::extraction::SafeExtractor;
use release_mirror::fetch::{ArtefactDownloader, HttpDownloader};
use release_mirror::manifest::ManifestTemplate;
use release_mirror::output::{
    format_plan_human, format_plan_json, success_message, write_stderr_line,
};
use release_mirror::pipeline::{PublishPlan, SyncContext, plan, run_sync};
use release_mirror::publish::Publisher;
use std::io::Write;

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

/// Routes `log` output to stderr; `RUST_LOG` overrides the flag-derived level.
fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let config = MirrorConfig::resolve(cli.config.as_deref())?;
    let executor = SystemCommandExecutor;
    let downloader = HttpDownloader::with_token(api_token(&config.source));
    let source = build_source(&config.source, &executor, &downloader);
    let destination = RegistryCatalog::new(config.destination.package.clone(), &executor);

    match &cli.command {
        Some(Command::Plan(args)) => {
            let pending = plan(&*source, &destination)?;
            write_plan(&pending, args, stdout)
        }
        Some(Command::Sync(_)) | None => {
            let template = ManifestTemplate::load(&template_path(cli, &config))?;
            let dry_run = cli.sync_args().dry_run;
            let publisher = Publisher::new(&executor, &config.destination.publish_args, dry_run);
            let context = SyncContext {
                source: &*source,
                downloader: &downloader,
                extractor: &SafeExtractor,
                publisher: &publisher,
                template: &template,
                package_dir: &config.destination.package_dir,
                quiet: cli.quiet,
            };

            let pending = plan(&*source, &destination)?;
            let report = run_sync(&pending, &context, stderr)?;
            if !cli.quiet && !report.published.is_empty() {
                write_stderr_line(
                    stderr,
                    success_message(
                        report.published.len(),
                        &config.destination.package,
                        dry_run,
                    ),
                );
            }
            Ok(())
        }
    }
}

/// Builds the configured upstream catalog.
fn build_source<'a>(
    source: &'a SourceConfig,
    executor: &'a dyn CommandExecutor,
    downloader: &'a dyn ArtefactDownloader,
) -> Box<dyn SourceCatalog + 'a> {
    match source {
        SourceConfig::Registry { package } => {
            Box::new(RegistryCatalog::new(package.as_str(), executor))
        }
        SourceConfig::Release {
            repository,
            asset_filter,
            include_prereleases,
            per_page,
            ..
        } => Box::new(
            ReleaseCatalog::new(repository.as_str(), asset_filter.as_str(), downloader)
                .include_prereleases(*include_prereleases)
                .per_page(*per_page),
        ),
    }
}

/// Reads the release API token from the configured environment variable.
fn api_token(source: &SourceConfig) -> Option<String> {
    match source {
        SourceConfig::Registry { .. } => None,
        SourceConfig::Release { token_env, .. } => std::env::var(token_env).ok(),
    }
}

/// The `--template` override, or the configured template.
fn template_path(cli: &Cli, config: &MirrorConfig) -> Utf8PathBuf {
    cli.sync_args()
        .template
        .clone()
        .unwrap_or_else(|| config.template.clone())
}

fn write_plan(
    pending: &PublishPlan,
    args: &PlanArgs,
    stdout: &mut dyn Write,
) -> Result<()> {
    let rendered = if args.json {
        format_plan_json(pending)
    } else {
        format_plan_human(pending)
    };
    writeln!(stdout, "{rendered}").map_err(|source| MirrorError::WriteFailed { source })
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
