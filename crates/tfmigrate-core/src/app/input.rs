//! Input list parsing.
//!
//! 全レコードを先に読み切ってからタスクを作ります。途中の行が壊れていれば
//! どのタスクも実行される前に run 全体が `InputFormatError` で止まります。

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::{MigrationTask, RepoCoordinates, StorageLocator};
use crate::ports::IdGenerator;

/// Column layout of the input CSV (no header row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// `bucket, key, workspace`
    StateOnly,
    /// `bucket, key, project, repo, branch, config_file, workspace`
    WithBackend,
}

impl RecordLayout {
    pub fn field_count(self) -> usize {
        match self {
            RecordLayout::StateOnly => 3,
            RecordLayout::WithBackend => 7,
        }
    }

    fn field_names(self) -> &'static [&'static str] {
        match self {
            RecordLayout::StateOnly => &["bucket", "key", "workspace"],
            RecordLayout::WithBackend => &[
                "bucket",
                "key",
                "project",
                "repo",
                "branch",
                "config_file",
                "workspace",
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum InputFormatError {
    #[error("error opening input file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error reading CSV input near line {line}: {source}")]
    Csv { line: u64, source: csv::Error },

    #[error("unexpected number of fields ({found}, expected {expected}) at line {line}: {record:?}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
        record: Vec<String>,
    },

    #[error("empty {field} at line {line}: {record:?}")]
    EmptyField {
        line: u64,
        field: &'static str,
        record: Vec<String>,
    },
}

/// Read every record of `path` and build one task per record.
pub fn read_tasks_from_path(
    path: &Path,
    layout: RecordLayout,
    ids: &dyn IdGenerator,
) -> Result<Vec<MigrationTask>, InputFormatError> {
    let file = File::open(path).map_err(|source| InputFormatError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tasks(file, layout, ids)
}

/// Parse CSV records from `reader`. Tasks keep the input order.
pub fn parse_tasks<R: Read>(
    reader: R,
    layout: RecordLayout,
    ids: &dyn IdGenerator,
) -> Result<Vec<MigrationTask>, InputFormatError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut tasks = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let fallback_line = index as u64 + 1;
        let record = result.map_err(|source| InputFormatError::Csv {
            line: source
                .position()
                .map(|p| p.line())
                .unwrap_or(fallback_line),
            source,
        })?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(fallback_line);
        let fields: Vec<String> = record.iter().map(str::to_string).collect();

        if fields.len() != layout.field_count() {
            return Err(InputFormatError::FieldCount {
                line,
                expected: layout.field_count(),
                found: fields.len(),
                record: fields,
            });
        }
        if let Some(pos) = fields.iter().position(|f| f.is_empty()) {
            return Err(InputFormatError::EmptyField {
                line,
                field: layout.field_names()[pos],
                record: fields,
            });
        }

        tasks.push(build_task(tasks.len(), fields, layout, ids));
    }

    Ok(tasks)
}

fn build_task(
    seq: usize,
    fields: Vec<String>,
    layout: RecordLayout,
    ids: &dyn IdGenerator,
) -> MigrationTask {
    let mut fields = fields.into_iter();
    let mut next = || fields.next().unwrap_or_default();

    let source = StorageLocator {
        bucket: next(),
        key: next(),
    };
    let repo = match layout {
        RecordLayout::StateOnly => None,
        RecordLayout::WithBackend => Some(RepoCoordinates {
            project: next(),
            repo: next(),
            branch: next(),
            config_file: next(),
        }),
    };
    let workspace = next();

    MigrationTask::new(ids.generate_task_id(), seq, source, workspace, repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{SystemClock, UlidGenerator};
    use rstest::rstest;

    fn parse(input: &str, layout: RecordLayout) -> Result<Vec<MigrationTask>, InputFormatError> {
        parse_tasks(input.as_bytes(), layout, &UlidGenerator::new(SystemClock))
    }

    #[test]
    fn parses_state_only_records_in_order() {
        let tasks = parse(
            "states,prod/network.tfstate,prod-network\nstates,prod/db.tfstate,prod-db\n",
            RecordLayout::StateOnly,
        )
        .unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].seq(), 0);
        assert_eq!(tasks[0].source().bucket, "states");
        assert_eq!(tasks[0].source().key, "prod/network.tfstate");
        assert_eq!(tasks[0].workspace(), "prod-network");
        assert!(tasks[0].repo().is_none());
        assert_eq!(tasks[1].seq(), 1);
        assert_eq!(tasks[1].workspace(), "prod-db");
        assert_ne!(tasks[0].id(), tasks[1].id());
    }

    #[test]
    fn parses_backend_records() {
        let tasks = parse(
            "states,prod/network.tfstate,OPS,network,master,main.tf,prod-network\n",
            RecordLayout::WithBackend,
        )
        .unwrap();

        let repo = tasks[0].repo().unwrap();
        assert_eq!(repo.project, "OPS");
        assert_eq!(repo.repo, "network");
        assert_eq!(repo.branch, "master");
        assert_eq!(repo.config_file, "main.tf");
        assert_eq!(tasks[0].workspace(), "prod-network");
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let tasks = parse(
            "states,\"weird,key.tfstate\",ws\n",
            RecordLayout::StateOnly,
        )
        .unwrap();
        assert_eq!(tasks[0].source().key, "weird,key.tfstate");
    }

    #[rstest]
    #[case::too_few("states,key\n", RecordLayout::StateOnly, 2)]
    #[case::too_many("a,b,c,d\n", RecordLayout::StateOnly, 4)]
    #[case::narrow_for_backend("a,b,c\n", RecordLayout::WithBackend, 3)]
    fn wrong_field_count_rejects_the_whole_input(
        #[case] input: &str,
        #[case] layout: RecordLayout,
        #[case] found: usize,
    ) {
        let err = parse(input, layout).unwrap_err();
        let InputFormatError::FieldCount { found: f, expected, .. } = err else {
            panic!("expected a field count error, got {err:?}");
        };
        assert_eq!(f, found);
        assert_eq!(expected, layout.field_count());
    }

    #[test]
    fn a_bad_later_record_fails_before_any_task_is_returned() {
        let input = "b,k1,ws1\nb,k2,ws2\nb,k3\n";
        let err = parse(input, RecordLayout::StateOnly).unwrap_err();
        match err {
            InputFormatError::FieldCount { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_required_field_is_rejected() {
        let err = parse("states,,ws\n", RecordLayout::StateOnly).unwrap_err();
        assert!(matches!(err, InputFormatError::EmptyField { field: "key", .. }));
    }

    #[test]
    fn empty_input_yields_no_tasks() {
        assert!(parse("", RecordLayout::StateOnly).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_tasks_from_path(
            Path::new("/nonexistent/tfmigrate-input.csv"),
            RecordLayout::StateOnly,
            &UlidGenerator::new(SystemClock),
        )
        .unwrap_err();
        assert!(matches!(err, InputFormatError::Open { .. }));
    }
}
