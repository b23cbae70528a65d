//! tfmigrate - S3 に置かれた Terraform state を TFE の workspace へ移行する CLI
//!
//! # 終了コード
//! - 0: run が最後まで完了（個別タスクの失敗はログとレポートで報告）
//! - 1: 設定・入力エラー（タスクは 1 つも実行されない）
//! - 2: `--strict` 指定時に完全移行できなかったタスクがある
//! - 130: Ctrl-C で中断

mod args;
mod logging;
mod settings;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use tfmigrate_core::app::{Orchestrator, OrchestratorBuilder};
use tfmigrate_core::domain::RunReport;
use tfmigrate_core::impls::{BitbucketClient, S3ObjectStore, TfeClient};
use tokio_util::sync::CancellationToken;

use crate::args::Args;

const EXIT_SETUP_ERROR: u8 = 1;
const EXIT_INCOMPLETE: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // help/version は stdout、それ以外は stderr
            let _ = e.print();
            return ExitCode::from(parse_failure_code(e.kind()));
        }
    };

    if let Err(e) = logging::init(args.log_level.as_deref()) {
        eprintln!("error: {e:#}");
        return ExitCode::from(EXIT_SETUP_ERROR);
    }

    ExitCode::from(finish(run(args).await))
}

/// Missing or invalid arguments are setup errors, not incomplete runs.
fn parse_failure_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => EXIT_SETUP_ERROR,
    }
}

fn finish(result: Result<u8>) -> u8 {
    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "migration aborted");
            EXIT_SETUP_ERROR
        }
    }
}

async fn run(args: Args) -> Result<u8> {
    let config = settings::migration_config(&args)?;

    let objects = Arc::new(S3ObjectStore::from_env().await);
    let workspaces = Arc::new(TfeClient::new(&args.tfe_address, &args.tfe_token));
    let mut builder = OrchestratorBuilder::new(config)
        .object_store(objects)
        .workspace_api(workspaces);
    if args.update_backend {
        let token = settings::bitbucket_token(&args)?;
        let bitbucket = BitbucketClient::new(&args.bitbucket_address, token);
        builder = builder.source_control(Arc::new(bitbucket));
    }
    let orchestrator = builder.build()?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(cancel.clone()));

    migrate(
        &orchestrator,
        &args.input,
        args.report.as_deref(),
        args.strict,
        cancel,
    )
    .await
}

/// Run the input list and turn the report into an exit code.
async fn migrate(
    orchestrator: &Orchestrator,
    input: &Path,
    report_path: Option<&Path>,
    strict: bool,
    cancel: CancellationToken,
) -> Result<u8> {
    let report = orchestrator
        .run_file(input, cancel)
        .await
        .context("failed to read the input list")?;

    if let Some(path) = report_path {
        write_report(path, &report)?;
    }

    Ok(exit_code(report.cancelled, report.all_migrated(), strict))
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupt received, cancelling in-flight tasks");
        cancel.cancel();
    }
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_vec_pretty(report).context("failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write run report to {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote run report");
    Ok(())
}

fn exit_code(cancelled: bool, all_migrated: bool, strict: bool) -> u8 {
    if cancelled {
        EXIT_INTERRUPTED
    } else if strict && !all_migrated {
        EXIT_INCOMPLETE
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tfmigrate_core::app::MigrationConfig;
    use tfmigrate_core::impls::{InMemoryObjectStore, InMemoryWorkspaceApi};

    const STATE: &str = r#"{"terraform_version":"0.12.29","serial":1,"lineage":"lin"}"#;

    #[rstest]
    #[case(false, true, false, 0)]
    #[case(false, false, false, 0)]
    #[case(false, true, true, 0)]
    #[case(false, false, true, EXIT_INCOMPLETE)]
    #[case(true, true, false, EXIT_INTERRUPTED)]
    #[case(true, false, true, EXIT_INTERRUPTED)]
    fn exit_codes(
        #[case] cancelled: bool,
        #[case] all_migrated: bool,
        #[case] strict: bool,
        #[case] expected: u8,
    ) {
        assert_eq!(exit_code(cancelled, all_migrated, strict), expected);
    }

    #[rstest]
    #[case(&["tfmigrate", "--input", "x.csv", "--tfe-token", "t"])]
    #[case(&["tfmigrate", "--organization", "acme", "--tfe-token", "t"])]
    #[case(&[
        "tfmigrate",
        "--input",
        "x.csv",
        "--organization",
        "acme",
        "--tfe-token",
        "t",
        "--bogus",
    ])]
    fn missing_or_unknown_arguments_exit_as_setup_errors(#[case] argv: &[&str]) {
        let err = Args::try_parse_from(argv).unwrap_err();
        assert_eq!(parse_failure_code(err.kind()), EXIT_SETUP_ERROR);
    }

    #[rstest]
    #[case("--help")]
    #[case("--version")]
    fn help_and_version_exit_cleanly(#[case] flag: &str) {
        let err = Args::try_parse_from(["tfmigrate", flag]).unwrap_err();
        assert_eq!(parse_failure_code(err.kind()), 0);
    }

    fn orchestrator(objects: Arc<InMemoryObjectStore>) -> Orchestrator {
        OrchestratorBuilder::new(MigrationConfig::new("acme"))
            .object_store(objects)
            .workspace_api(Arc::new(InMemoryWorkspaceApi::new()))
            .build()
            .unwrap()
    }

    fn input_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn malformed_record_exits_with_setup_error_before_any_download() {
        let objects = Arc::new(InMemoryObjectStore::new());
        objects.put("b", "a.tfstate", STATE);
        let input = input_file("b,a.tfstate,alpha\nb,c.tfstate\n");

        let result = migrate(
            &orchestrator(objects.clone()),
            input.path(),
            None,
            false,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(finish(result), EXIT_SETUP_ERROR);
        assert_eq!(objects.downloads(), 0);
    }

    #[tokio::test]
    async fn missing_input_file_exits_with_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = migrate(
            &orchestrator(Arc::new(InMemoryObjectStore::new())),
            &dir.path().join("absent.csv"),
            None,
            false,
            CancellationToken::new(),
        )
        .await;
        assert_eq!(finish(result), EXIT_SETUP_ERROR);
    }

    #[tokio::test]
    async fn failed_task_exits_zero_unless_strict_and_writes_the_report() {
        let objects = Arc::new(InMemoryObjectStore::new());
        objects.put("b", "a.tfstate", STATE);
        let input = input_file("b,a.tfstate,alpha\nb,missing.tfstate,beta\n");
        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("report.json");

        let lenient = migrate(
            &orchestrator(objects.clone()),
            input.path(),
            Some(&report_path),
            false,
            CancellationToken::new(),
        )
        .await;
        assert_eq!(finish(lenient), 0);

        let report: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&report_path).unwrap()).unwrap();
        assert_eq!(report["total"], 2);
        assert_eq!(report["migrated"], 1);
        assert_eq!(report["failed"], 1);

        let strict = migrate(
            &orchestrator(objects),
            input.path(),
            None,
            true,
            CancellationToken::new(),
        )
        .await;
        assert_eq!(finish(strict), EXIT_INCOMPLETE);
    }
}
