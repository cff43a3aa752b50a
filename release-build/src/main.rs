//! Release pipeline CLI entrypoint.
//!
//! Resolves configuration, selects targets, and runs the pipeline with real
//! processes. The exit code is `0` only when every selected target produced
//! an archive.

use clap::Parser;
use release_build::cancel::CancellationToken;
use release_build::cli::Cli;
use release_build::config::{ReleaseConfig, RunSettings};
use release_build::error::Result;
use release_build::exec::SystemCommandExecutor;
use release_build::output::{
    DryRunInfo, Progress, summary_text, write_json_report, write_stderr_line,
};
use release_build::packaging::Packager;
use release_build::pipeline::{PipelineContext, run_pipeline};
use release_build::target::select_targets;
use release_build::toolchain::{ToolchainResolver, host_search_path};
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel);

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &cancel, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// `RUST_LOG` wins over `-v`/`-q` when set.
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn install_interrupt_handler(cancel: &CancellationToken) {
    let handler_token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_token.cancel()) {
        log::warn!("could not install interrupt handler: {err}");
    }
}

fn run(
    cli: &Cli,
    cancel: &CancellationToken,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let project_root = cli.project_root();
    let config = ReleaseConfig::discover(cli.config.as_deref(), project_root)?;
    let settings = RunSettings::resolve(project_root, config, cli.overrides())?;
    let targets = select_targets(cli.targets.as_deref())?;

    let resolver = ToolchainResolver::new(&settings.packages_root, settings.toolchain.clone())
        .with_search_path(host_search_path());
    let packager = Packager::new(settings.output_dir.clone());

    if cli.dry_run {
        let info = DryRunInfo {
            resolver: &resolver,
            project: &settings.project,
            packager: &packager,
            version: &settings.version,
            base_name: &settings.base_name,
            targets: &targets,
        };
        write_stderr_line(stderr, info.display_text());
        return Ok(0);
    }

    let executor = SystemCommandExecutor;
    let context = PipelineContext {
        resolver: &resolver,
        executor: &executor,
        project: &settings.project,
        packager: &packager,
        version: &settings.version,
        base_name: &settings.base_name,
        inspector: &settings.inspector,
        expected_dependencies: settings.expected_dependencies.as_deref(),
        policy: settings.policy,
        cancel,
    };
    let report = run_pipeline(&context, &targets, &mut Progress::new(stderr, cli.quiet));

    if !cli.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(stderr, summary_text(&report));
    }
    if cli.json {
        write_json_report(stdout, &report)?;
    }
    Ok(report.exit_code())
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use release_build::error::ReleaseError;
    use release_build::target::TargetError;
    use rstest::rstest;

    #[rstest]
    #[case::all_done(0)]
    #[case::some_failed(1)]
    fn exit_code_passes_through_report_code(#[case] code: i32) {
        let mut stderr = Vec::new();
        assert_eq!(exit_code_for_run_result(Ok(code), &mut stderr), code);
        assert!(stderr.is_empty());
    }

    #[test]
    fn configuration_errors_are_printed_and_exit_one() {
        let err = ReleaseError::Target(TargetError::NoEnabledTargets {
            filter: "android".to_owned(),
        });
        let mut stderr = Vec::new();

        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);

        assert_eq!(exit_code, 1);
        let text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(text.contains("no enabled target matches \"android\""));
    }

    #[test]
    fn dry_run_writes_plan_without_running_anything() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let root = dir.path().to_str().expect("utf8 temp dir");
        let cli = Cli::parse_from([
            "release-build",
            "--dry-run",
            "--version",
            "1.2.3",
            "--targets",
            "x86_64-unknown-linux-musl",
            "--project-root",
            root,
        ]);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let code = run(&cli, &CancellationToken::new(), &mut stdout, &mut stderr)
            .expect("dry run succeeds");

        assert_eq!(code, 0);
        assert!(stdout.is_empty());
        let text = String::from_utf8_lossy(&stderr);
        assert!(text.contains("mp4decrypt-1.2.3-x86_64-unknown-linux-musl.tar.xz"));
        assert!(!dir.path().join("release").exists());
    }
}
