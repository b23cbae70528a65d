//! Domain model (IDs, tasks, state machine, metadata, errors, outcomes).

pub mod errors;
pub mod ids;
pub mod metadata;
pub mod outcome;
pub mod state;
pub mod task;

pub use self::errors::{
    BackendUpdateError, MigrationError, ObjectStoreError, SourceControlError, WorkspaceApiError,
};
pub use self::ids::{RunId, TaskId};
pub use self::metadata::{IncompleteMetadata, StateMeta, try_parse_metadata, validate_metadata};
pub use self::outcome::{OutcomeKind, RunReport, TaskOutcome};
pub use self::state::{Stage, TaskState};
pub use self::task::{MigrationTask, RepoCoordinates, StorageLocator};
