//! SQL migration definitions for the course database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: courses, events",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per committed course; (term, year, code) identifies it on re-import.
CREATE TABLE IF NOT EXISTS courses (
    id              TEXT PRIMARY KEY,
    term            TEXT NOT NULL,
    year            INTEGER NOT NULL,
    code            TEXT NOT NULL,
    name            TEXT NOT NULL,
    instructor_json TEXT,
    credits         REAL,
    schedule_json   TEXT NOT NULL DEFAULT '[]',
    grading_json    TEXT NOT NULL DEFAULT '[]',
    source_hash     TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_courses_semester ON courses(year, term);

CREATE TABLE IF NOT EXISTS events (
    id               TEXT PRIMARY KEY,
    course_id        TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    kind             TEXT NOT NULL,
    title            TEXT NOT NULL,
    date             TEXT NOT NULL,
    start_time       TEXT,
    end_time         TEXT,
    confidence       REAL NOT NULL,
    completed        INTEGER NOT NULL DEFAULT 0,
    outside_semester INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_events_course ON events(course_id);
CREATE INDEX IF NOT EXISTS idx_events_date ON events(date);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Import log for committed imports",
            sql: r#"
CREATE TABLE IF NOT EXISTS imports (
    id                TEXT PRIMARY KEY,
    course_id         TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    events_created    INTEGER NOT NULL,
    events_superseded INTEGER NOT NULL,
    committed_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_imports_course ON imports(course_id);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
        Migration {
            version: 3,
            description: "Count events removed by re-import",
            sql: r#"
ALTER TABLE imports ADD COLUMN events_removed INTEGER NOT NULL DEFAULT 0;

INSERT INTO schema_migrations (version) VALUES (3);
"#,
        },
    ]
}
