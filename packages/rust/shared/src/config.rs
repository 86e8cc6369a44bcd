//! Application configuration for syllabus imports.
//!
//! User config lives at `~/.syllabus/syllabus.toml`.
//! CLI flags override config file values, which override defaults.
//! Components never read this globally: callers pass the relevant section
//! ([`ConflictConfig`], [`NormalizerConfig`], [`ImportConfig`],
//! [`SemesterCalendar`]) into each call.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyllabusError};
use crate::types::{Semester, SemesterKey, Term};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "syllabus.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".syllabus";

/// Course database file name inside `data_dir`.
const DATABASE_FILE_NAME: &str = "syllabus.db";

// ---------------------------------------------------------------------------
// Config structs (matching syllabus.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Conflict detection tuning.
    #[serde(default)]
    pub conflicts: ConflictConfig,

    /// Event normalization tuning.
    #[serde(default)]
    pub normalizer: NormalizerConfig,

    /// Import limits.
    #[serde(default)]
    pub import: ImportConfig,

    /// Explicit semester windows overriding the built-in term defaults.
    #[serde(default)]
    pub semesters: Vec<SemesterWindowEntry>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding the course database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Look-ahead for the semester overview's upcoming list.
    #[serde(default = "default_upcoming_days")]
    pub upcoming_days: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            upcoming_days: default_upcoming_days(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.syllabus/data".into()
}
fn default_upcoming_days() -> u32 {
    7
}

/// `[conflicts]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Events this many days apart (or closer) raise a low-severity conflict.
    #[serde(default = "default_proximity_days")]
    pub proximity_days: u32,

    /// Skip events already marked complete.
    #[serde(default)]
    pub ignore_completed: bool,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            proximity_days: default_proximity_days(),
            ignore_completed: false,
        }
    }
}

fn default_proximity_days() -> u32 {
    3
}

/// `[normalizer]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Token Jaccard similarity at which two same-day titles are duplicates.
    #[serde(default = "default_title_similarity")]
    pub title_similarity: f32,

    /// Events below this confidence carry a low-confidence warning.
    #[serde(default = "default_low_confidence")]
    pub low_confidence: f32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            title_similarity: default_title_similarity(),
            low_confidence: default_low_confidence(),
        }
    }
}

fn default_title_similarity() -> f32 {
    0.6
}
fn default_low_confidence() -> f32 {
    0.5
}

/// `[import]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Files extracted and parsed in parallel during a bulk import.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Documents larger than this are rejected as unsupported.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Staged imports neither confirmed nor rolled back within this many
    /// seconds are discarded.
    #[serde(default = "default_staged_ttl_secs")]
    pub staged_ttl_secs: u64,

    /// Finished imports (rolled back or handed to sync) whose state stays
    /// queryable; older ones are forgotten.
    #[serde(default = "default_retained_imports")]
    pub retained_imports: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_file_bytes: default_max_file_bytes(),
            staged_ttl_secs: default_staged_ttl_secs(),
            retained_imports: default_retained_imports(),
        }
    }
}

fn default_concurrency() -> u32 {
    4
}
fn default_max_file_bytes() -> u64 {
    25 * 1024 * 1024
}
fn default_staged_ttl_secs() -> u64 {
    60 * 60
}
fn default_retained_imports() -> usize {
    256
}

/// `[[semesters]]` entry: an explicit academic window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterWindowEntry {
    pub term: Term,
    pub year: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

// ---------------------------------------------------------------------------
// Semester calendar (runtime, resolved from config)
// ---------------------------------------------------------------------------

/// Resolves semester keys to academic windows.
#[derive(Debug, Clone, Default)]
pub struct SemesterCalendar {
    overrides: Vec<SemesterWindowEntry>,
}

impl SemesterCalendar {
    pub fn new(overrides: Vec<SemesterWindowEntry>) -> Self {
        Self { overrides }
    }

    /// Window for `key`: an explicit entry if configured, else the term default.
    pub fn resolve(&self, key: SemesterKey) -> Semester {
        if let Some(entry) = self
            .overrides
            .iter()
            .find(|e| e.term == key.term && e.year == key.year)
        {
            return Semester {
                key,
                start: entry.start,
                end: entry.end,
            };
        }
        let (start, end) = key.term.default_window(key.year);
        Semester { key, start, end }
    }

    /// Check that every override has `start <= end`.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.overrides {
            if entry.start > entry.end {
                return Err(SyllabusError::config(format!(
                    "semester {} {} starts after it ends",
                    entry.term, entry.year
                )));
            }
        }
        Ok(())
    }
}

impl From<&AppConfig> for SemesterCalendar {
    fn from(config: &AppConfig) -> Self {
        Self::new(config.semesters.clone())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.syllabus/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| SyllabusError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.syllabus/syllabus.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SyllabusError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| SyllabusError::config(format!("failed to parse {}: {e}", path.display())))?;
    SemesterCalendar::from(&config).validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SyllabusError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SyllabusError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SyllabusError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the course database path from `[defaults].data_dir`, expanding a
/// leading `~` to the home directory.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    let raw = config.defaults.data_dir.trim();
    let dir = match raw.strip_prefix('~') {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| SyllabusError::config("could not determine home directory"))?;
            home.join(rest.trim_start_matches(['/', '\\']))
        }
        None => PathBuf::from(raw),
    };
    Ok(dir.join(DATABASE_FILE_NAME))
}
