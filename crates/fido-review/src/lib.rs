pub mod aggregate;
pub mod claim;
pub mod export;
pub mod ingest;
pub mod review;

pub use aggregate::{
    gmv_band, gmv_band_breakdown, project_stats, queue_stats, reviewer_stats, sort_by_priority,
    update_classification, update_classification_all, BucketTotals, GmvBand, ProjectStats,
    QueueStats, ReviewerStats, UpdateClassification,
};
pub use claim::{
    claim_in_store, claim_project, claim_status, release_in_store, release_project, ClaimState,
};
pub use export::{export_table, to_csv, ExportView};
pub use ingest::{
    delete_in_store, ingest, ingest_csv, normalize_schema, parse_csv, prepare_upload, Ingested,
    UploadRequest,
};
pub use review::{review_in_store, submit_review, ReviewEdits};

use fido_core::{AuthError, KeyError, TableError};
use fido_storage::{SaveReport, StorageError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("upload has no rows or no columns")]
    EmptyUpload,
    #[error("could not parse upload: {0}")]
    Parse(String),
    #[error("not authorized: {0}")]
    Auth(#[from] AuthError),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("table error: {0}")]
    Table(#[from] TableError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("cannot both edit and mark no-change")]
    ConflictingReview,
    #[error("must either edit or mark no-change")]
    IncompleteReview,
    #[error("reviewer name cannot be empty")]
    MissingReviewer,
    #[error("record {0} not found in project")]
    RecordNotFound(String),
    #[error("project already claimed by {0}")]
    AlreadyClaimed(String),
    #[error("{user} cannot release a project claimed by {claimed_by}")]
    NotClaimant { user: String, claimed_by: String },
    #[error("table error: {0}")]
    Table(#[from] TableError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("export encoding error: {0}")]
    Encoding(String),
}

/// Folds storage warnings from a refresh into the report of the save that
/// followed it, so callers see everything that degraded in one place.
fn merge_warnings(load_warnings: Vec<StorageError>, save: SaveReport) -> SaveReport {
    let mut warnings = load_warnings;
    warnings.extend(save.warnings);
    SaveReport { warnings }
}
