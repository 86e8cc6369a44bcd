//! CLI command definitions, routing, and tracing setup.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use syllabus_core::{
    BulkImportResult, ConfirmedImport, ImportCoordinator, ImportFile, ProgressReporter,
};
use syllabus_extract::DocumentFormat;
use syllabus_shared::{
    AppConfig, Conflict, CourseId, Event, EventId, ImportResult, SemesterKey, SyllabusError,
    database_path, init_config, load_config, load_config_from,
};
use syllabus_storage::CourseStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Syllabus: turn course syllabi into a conflict-checked semester calendar.
#[derive(Parser)]
#[command(
    name = "syllabus",
    version,
    about = "Import course syllabi and track deadlines, exams, and conflicts per semester.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Result format on stdout: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Config file (defaults to ~/.syllabus/syllabus.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Course database (defaults to <data_dir>/syllabus.db).
    #[arg(long, env = "SYLLABUS_DB", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Command result format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Preview one syllabus and, once confirmed, commit it.
    Import {
        /// Syllabus file (PDF, DOCX, or plain text).
        file: PathBuf,

        /// Target semester, e.g. "Fall 2025". Inferred from the document if omitted.
        #[arg(short, long)]
        semester: Option<SemesterKey>,

        /// Declared format (pdf, docx, txt). Content sniffing takes precedence.
        #[arg(short, long)]
        format: Option<DocumentFormat>,

        /// Commit without asking.
        #[arg(short, long)]
        yes: bool,
    },

    /// Import many syllabi at once; one bad file never stops the rest.
    Bulk {
        /// Syllabus files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Target semester for every file. Inferred per file if omitted.
        #[arg(short, long)]
        semester: Option<SemesterKey>,
    },

    /// List a semester's courses.
    Courses {
        #[arg(short, long)]
        semester: SemesterKey,
    },

    /// Summarize a semester and list what is coming up.
    Overview {
        #[arg(short, long)]
        semester: SemesterKey,

        /// Look-ahead window in days (defaults to `upcoming_days` from config).
        #[arg(long)]
        days: Option<u32>,

        /// Reference date (defaults to today).
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Report scheduling conflicts across a semester's courses.
    Conflicts {
        #[arg(short, long)]
        semester: SemesterKey,
    },

    /// Mark an event as done.
    Complete {
        /// Course id.
        course_id: CourseId,

        /// Event id.
        event_id: EventId,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so `--output json`
/// stays machine-readable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "syllabus=info",
        1 => "syllabus=debug",
        _ => "syllabus=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        output: cli.output,
        config_path: cli.config,
        db: cli.db,
    };

    match cli.command {
        Command::Import {
            file,
            semester,
            format,
            yes,
        } => cmd_import(&ctx, &file, semester, format, yes).await,
        Command::Bulk { files, semester } => cmd_bulk(&ctx, &files, semester).await,
        Command::Courses { semester } => cmd_courses(&ctx, semester).await,
        Command::Overview {
            semester,
            days,
            today,
        } => cmd_overview(&ctx, semester, days, today).await,
        Command::Conflicts { semester } => cmd_conflicts(&ctx, semester).await,
        Command::Complete {
            course_id,
            event_id,
        } => cmd_complete(&ctx, course_id, event_id).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&ctx).await,
        },
    }
}

/// Global flags every command needs.
struct Context {
    output: OutputFormat,
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
}

impl Context {
    fn config(&self) -> Result<AppConfig> {
        let config = match &self.config_path {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        Ok(config)
    }

    /// Load config, open the course database, and wire the coordinator.
    async fn coordinator(&self) -> Result<(AppConfig, ImportCoordinator)> {
        let config = self.config()?;
        let path = match &self.db {
            Some(path) => path.clone(),
            None => database_path(&config)?,
        };
        info!(db = %path.display(), "opening course database");
        let store = CourseStore::open(&path)
            .await
            .wrap_err_with(|| format!("cannot open course database at {}", path.display()))?;
        let coordinator = ImportCoordinator::new(Arc::new(store), &config);
        Ok((config, coordinator))
    }

    fn json(&self) -> bool {
        self.output == OutputFormat::Json
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format hint from the file extension, if it names one we know.
fn extension_hint(path: &Path) -> Option<DocumentFormat> {
    let ext = path.extension()?.to_str()?;
    match ext.parse::<DocumentFormat>() {
        Ok(DocumentFormat::Unknown) | Err(_) => None,
        Ok(format) => Some(format),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

async fn cmd_import(
    ctx: &Context,
    file: &Path,
    semester: Option<SemesterKey>,
    format: Option<DocumentFormat>,
    yes: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .wrap_err_with(|| format!("cannot read {}", file.display()))?;
    let (_, coordinator) = ctx.coordinator().await?;

    info!(file = %file.display(), semester = ?semester, "importing syllabus");
    let hint = format.or_else(|| extension_hint(file));
    let preview = coordinator.preview_import(&bytes, hint, semester).await?;

    if !ctx.json() {
        print_preview(&preview);
    }

    let commit = yes || (!ctx.json() && confirm_prompt().await?);
    if !commit {
        coordinator.rollback_import(preview.import_id).await?;
        if ctx.json() {
            print_json(&serde_json::json!({ "preview": preview, "committed": false }))?;
        } else {
            println!("  Nothing saved. Re-run with --yes to commit this import.");
        }
        return Ok(());
    }

    let confirmed = coordinator.confirm_import(preview.import_id).await?;
    if ctx.json() {
        print_json(&serde_json::json!({
            "preview": preview,
            "committed": true,
            "confirmed": confirmed,
        }))?;
    } else {
        print_confirmed(&confirmed);
    }
    Ok(())
}

/// Ask on the terminal whether to commit. Non-interactive stdin never commits.
async fn confirm_prompt() -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(false);
    }
    let answer = tokio::task::spawn_blocking(|| {
        use std::io::Write;
        print!("  Commit this import? [y/N] ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok::<_, std::io::Error>(line)
    })
    .await??;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

fn print_preview(preview: &ImportResult) {
    let course = &preview.course;
    println!();
    println!("  {} {}  ({})", course.code, course.name, preview.semester);
    if let Some(instructor) = &course.instructor {
        println!("  Instructor: {}", instructor.name);
    }
    if let Some(credits) = course.credits {
        println!("  Credits:    {credits}");
    }
    println!();
    print_events(&preview.events);

    if !preview.warnings.is_empty() {
        println!();
        println!("  Warnings:");
        for warning in &preview.warnings {
            println!("    - {}", warning.message);
        }
    }
    if !preview.conflicts.is_empty() {
        println!();
        println!("  Conflicts with existing courses:");
        print_conflicts(&preview.conflicts);
    }
    println!();
}

fn print_confirmed(confirmed: &ConfirmedImport) {
    println!();
    println!("  Import committed!");
    println!("  Course:     {} ({})", confirmed.course.code, confirmed.course.id);
    println!("  Created:    {}", confirmed.events_created);
    println!("  Superseded: {}", confirmed.events_superseded);
    if confirmed.events_removed > 0 {
        println!("  Removed:    {}", confirmed.events_removed);
    }
    println!("  Conflicts:  {}", confirmed.conflicts.len());
    println!();
}

fn print_events(events: &[Event]) {
    if events.is_empty() {
        println!("  (no events)");
        return;
    }
    for event in events {
        let time = event.time.map(|t| t.to_string()).unwrap_or_default();
        let mark = if event.completed { "x" } else { " " };
        println!(
            "  [{mark}] {}  {:<11}  {:<10}  {:<8}  {}",
            event.date, time, event.kind, event.course_code, event.title
        );
    }
}

fn print_conflicts(conflicts: &[Conflict]) {
    for c in conflicts {
        println!(
            "    {:<8}  {} {} ({})  vs  {} {} ({})  - {}",
            c.severity,
            c.first.date,
            c.first.course_code,
            c.first.title,
            c.second.date,
            c.second.course_code,
            c.second.title,
            c.reason
        );
    }
}

// ---------------------------------------------------------------------------
// Bulk import
// ---------------------------------------------------------------------------

async fn cmd_bulk(ctx: &Context, paths: &[PathBuf], semester: Option<SemesterKey>) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .wrap_err_with(|| format!("cannot read {}", path.display()))?;
        files.push(ImportFile {
            name: display_name(path),
            bytes,
            format: extension_hint(path),
        });
    }
    let (_, coordinator) = ctx.coordinator().await?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing files already in progress");
                cancel.cancel();
            }
        })
    };

    info!(files = files.len(), semester = ?semester, "starting bulk import");
    let reporter = CliProgress::new(files.len(), ctx.json());
    let result = coordinator
        .bulk_import(files, semester, &cancel, &reporter)
        .await;
    interrupt.abort();

    if ctx.json() {
        return print_json(&result);
    }

    println!();
    println!("  Bulk import finished");
    println!("  Total:      {}", result.total);
    println!("  Successful: {}", result.successful);
    println!("  Failed:     {}", result.failed.len());
    if result.skipped > 0 {
        println!("  Skipped:    {} (cancelled)", result.skipped);
    }
    for imported in &result.imported {
        println!(
            "    ok    #{} {}: {} ({} events, {} conflicts)",
            imported.file,
            imported.name,
            imported.course_code,
            imported.events_created,
            imported.conflicts
        );
    }
    for failure in &result.failed {
        println!(
            "    fail  #{} {}: [{}] {}",
            failure.file, failure.name, failure.error, failure.message
        );
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Bulk import progress bar; hidden when stdout carries JSON.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(total: usize, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        let style = ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn file_finished(
        &self,
        name: &str,
        current: usize,
        _total: usize,
        error: Option<&SyllabusError>,
    ) {
        self.bar.set_position(current as u64);
        match error {
            Some(e) => self.bar.println(format!("  ✗ {name}: {e}")),
            None => self.bar.set_message(name.to_string()),
        }
    }

    fn done(&self, _result: &BulkImportResult) {
        self.bar.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

async fn cmd_courses(ctx: &Context, semester: SemesterKey) -> Result<()> {
    let (_, coordinator) = ctx.coordinator().await?;
    let courses = coordinator.list_courses(semester).await;

    if ctx.json() {
        return print_json(&courses);
    }
    if courses.is_empty() {
        println!("No courses imported for {semester}.");
        return Ok(());
    }
    println!();
    println!("  {semester}");
    for course in &courses {
        let events = coordinator.store().course_events(course.id).await?;
        let instructor = course
            .instructor
            .as_ref()
            .map(|i| i.name.as_str())
            .unwrap_or("-");
        println!(
            "  {:<10} {:<36} {:<20} {:>3} events  {}",
            course.code,
            course.name,
            instructor,
            events.len(),
            course.id
        );
    }
    println!();
    Ok(())
}

async fn cmd_overview(
    ctx: &Context,
    semester: SemesterKey,
    days: Option<u32>,
    today: Option<NaiveDate>,
) -> Result<()> {
    let (config, coordinator) = ctx.coordinator().await?;
    let days = days.unwrap_or(config.defaults.upcoming_days);
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let overview = coordinator.semester_overview(semester, today, days).await;

    if ctx.json() {
        return print_json(&overview);
    }
    println!();
    println!("  {}", overview.semester);
    println!("  Courses:     {}", overview.total_courses);
    println!("  Exams:       {}", overview.exam_count);
    println!("  Assignments: {}", overview.assignment_count);
    println!("  Projects:    {}", overview.project_count);
    println!("  Completed:   {}", overview.completed_count);
    println!();
    println!("  Next {days} days:");
    print_events(&overview.upcoming);
    println!();
    Ok(())
}

async fn cmd_conflicts(ctx: &Context, semester: SemesterKey) -> Result<()> {
    let (_, coordinator) = ctx.coordinator().await?;
    let conflicts = coordinator.detect_conflicts(semester).await;

    if ctx.json() {
        return print_json(&conflicts);
    }
    if conflicts.is_empty() {
        println!("No conflicts in {semester}.");
        return Ok(());
    }
    println!();
    println!("  {} conflicts in {semester}:", conflicts.len());
    print_conflicts(&conflicts);
    println!();
    Ok(())
}

async fn cmd_complete(ctx: &Context, course_id: CourseId, event_id: EventId) -> Result<()> {
    let (_, coordinator) = ctx.coordinator().await?;
    let event = coordinator
        .mark_event_complete(course_id, event_id)
        .await
        .map_err(|e| match e {
            SyllabusError::NotFound { .. } => eyre!("{e} (check ids with `syllabus courses`)"),
            other => other.into(),
        })?;

    if ctx.json() {
        return print_json(&event);
    }
    println!("Completed: {} {} ({})", event.course_code, event.title, event.date);
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(ctx: &Context) -> Result<()> {
    let config = ctx.config()?;
    if ctx.json() {
        return print_json(&config);
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
