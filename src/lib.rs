// Panel Reconcile - Core Library
// Exposes the reconciliation engine for the CLI and integration tests

pub mod entities;
pub mod error;
pub mod parser;
pub mod schema;
pub mod normalizer;
pub mod precedence;
pub mod snapshot;
pub mod merge;
pub mod diff;
pub mod generate;
pub mod output;
pub mod report;
pub mod db;
pub mod config;

// Re-export commonly used types
pub use entities::{
    ClinicalIndication, Confidence, Gene, GeneRef, Panel, PanelGene, PanelKey, PanelSource, Transcript,
};
pub use error::{DbError, EmitError, ReconcileError, SourceError};
pub use parser::{
    detect_format, get_loader, load_source,
    IndicationTarget, LoadWarning, LoadedSource, RawRecords, SourceFormat, SourceLoader,
};
pub use schema::{TableSchema, ValidationError};
pub use normalizer::{GeneIndex, MatchTier, Resolution};
pub use precedence::{Attribute, Candidate, ConflictKind, ConflictRecord, EntityType};
pub use snapshot::{CanonicalSnapshot, SourceProvenance};
pub use merge::{reconcile, Reconciliation};
pub use diff::{diff_against_database, AttributeChange, DiffKind, DiffRecord};
pub use generate::{emit, is_reportable, Artifact, ArtifactFormat, FilterPolicy};
pub use output::{create_run_directory, RunDirectory};
pub use report::{ReportSummary, RunReport};
pub use db::{
    load_database_snapshot, open_database, open_database_readonly, setup_database, store_snapshot,
};
pub use config::{load_config, RunConfig, SourceEntry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
