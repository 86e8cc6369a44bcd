//! Syllabus CLI: import course syllabi into a local semester calendar.
//!
//! Extracts deadlines and exams from PDF, DOCX, and plain-text syllabi,
//! stores them per semester, and reports scheduling conflicts.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
