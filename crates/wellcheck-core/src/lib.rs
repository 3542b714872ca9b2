//! # Wellcheck Core Library
//!
//! This library provides the assessment and progress engine behind the
//! wellcheck health-content quizzes. It follows a CLI-first philosophy: every
//! operation is available through the standalone `wellcheck` binary, and any
//! UI is a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Scoring**: pure functions that classify constitution answers and score
//!   right/wrong quizzes into proficiency levels
//! - **Quiz**: a per-stage state machine plus an orchestrator enforcing unlock
//!   rules across stages; the caller drives auto-save through `tick()`
//! - **Persistence**: versioned JSON snapshots over a pluggable blob store,
//!   with migration, validation, and checksummed export bundles
//! - **Storage**: data directory resolution and TOML configuration
//!
//! ## Key Components
//!
//! - [`Orchestrator`]: multi-stage quiz driver
//! - [`StageProgress`]: single-stage state machine
//! - [`PersistenceManager`]: snapshot save / load / export
//! - [`ContentLibrary`]: question banks and recommendations
//! - [`AppConfig`]: application configuration

pub mod content;
pub mod error;
pub mod events;
pub mod persistence;
pub mod quiz;
pub mod scoring;
pub mod storage;

pub use content::{Answer, AnswerValue, Constitution, Content, ContentLibrary, Question};
pub use error::{ConfigError, ContentError, CoreError, PersistenceError, QuizError};
pub use events::Event;
pub use persistence::{
    AutoSave, BlobStore, ExportBundle, FileBlobStore, LifecycleEvent, MemoryBlobStore,
    PersistedSnapshot, PersistenceManager, SCHEMA_VERSION,
};
pub use quiz::{
    Orchestrator, OverallResult, ProgressState, QuizPlan, ResumePoint, StageDefinition,
    StageProgress, StageResult, StageStatus, UserPreferences,
};
pub use scoring::{
    assess_constitution, classify, level_for_percentage, score_quiz, ClassificationResult,
    ConstitutionReport, Level, QuizScore,
};
pub use storage::{data_dir, AppConfig};
