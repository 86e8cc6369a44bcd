//! Shared types, error model, and configuration for syllabus imports.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`SyllabusError`], the unified error type
//! - Domain types ([`Course`], [`Event`], [`Semester`], [`Conflict`], [`ImportResult`])
//! - Configuration ([`AppConfig`], [`SemesterCalendar`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConflictConfig, DefaultsConfig, ImportConfig, NormalizerConfig, SemesterCalendar,
    SemesterWindowEntry, config_dir, config_file_path, database_path, init_config, load_config,
    load_config_from,
};
pub use error::{Result, SyllabusError};
pub use types::{
    Conflict, Course, CourseId, CourseUpdate, Event, EventId, EventKey, EventKind, EventRef,
    GradingComponent, ImportId, ImportResult, ImportWarning, Instructor, MeetingPattern, Semester,
    SemesterKey, Severity, Term, TimeWindow, WarningKind, content_hash,
};
