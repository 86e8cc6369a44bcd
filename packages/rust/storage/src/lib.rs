//! Course persistence and the per-semester course store.
//!
//! [`CourseStore`] is the in-memory registry every import commits into. It
//! optionally writes through to a [`Storage`] handle, a local libSQL database
//! holding committed courses, events, and the import log.

mod migrations;
mod store;

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use libsql::{Connection, Database, params};
use serde::{Deserialize, Serialize};
use syllabus_shared::{
    Course, CourseId, Event, EventId, EventKind, ImportId, Result, SemesterKey, SyllabusError,
    Term, TimeWindow,
};

pub use store::{CommitOutcome, CourseStore, MergePreview, SemesterSnapshot, StagedImport};

/// One committed import, as recorded in the import log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub import_id: ImportId,
    pub course_id: CourseId,
    pub events_created: usize,
    pub events_superseded: usize,
    /// Committed events of the course that the import no longer listed.
    #[serde(default)]
    pub events_removed: usize,
    pub committed_at: DateTime<Utc>,
}

/// Everything persisted, as loaded on open.
#[derive(Debug, Default)]
pub struct Loaded {
    pub courses: Vec<Course>,
    pub events: Vec<Event>,
    pub imports: Vec<ImportRecord>,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

fn storage_err(e: libsql::Error) -> SyllabusError {
    SyllabusError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyllabusError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        SyllabusError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist one commit: the course row, every touched event, the removal
    /// of superseded events, and the import log entry, inside a single
    /// transaction.
    pub async fn save_commit(
        &self,
        course: &Course,
        events: &[Event],
        removed: &[EventId],
        record: &ImportRecord,
    ) -> Result<()> {
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        let written = async {
            upsert_course(&tx, course).await?;
            for event in events {
                upsert_event(&tx, event).await?;
            }
            for event_id in removed {
                delete_event(&tx, *event_id).await?;
            }
            insert_import(&tx, record).await
        }
        .await;

        match written {
            Ok(()) => tx.commit().await.map_err(storage_err),
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback after failed commit");
                }
                Err(e)
            }
        }
    }

    /// Overwrite a course row after an explicit update.
    pub async fn save_course(&self, course: &Course) -> Result<()> {
        upsert_course(&self.conn, course).await
    }

    /// Set the completion flag of an event.
    pub async fn set_event_completed(&self, event_id: EventId, completed: bool) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE events SET completed = ?1 WHERE id = ?2",
                params![i64::from(completed), event_id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        if changed == 0 {
            return Err(SyllabusError::not_found(format!("event {event_id}")));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Load every course, event, and import record.
    pub async fn load_all(&self) -> Result<Loaded> {
        let mut loaded = Loaded::default();

        let mut rows = self
            .conn
            .query(
                "SELECT id, term, year, code, name, instructor_json, credits, schedule_json,
                        grading_json, source_hash, created_at, updated_at
                 FROM courses ORDER BY year, term, code",
                params![],
            )
            .await
            .map_err(storage_err)?;
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            loaded.courses.push(row_to_course(&row)?);
        }

        let mut rows = self
            .conn
            .query(
                "SELECT e.id, e.course_id, c.code, e.kind, e.title, e.date, e.start_time,
                        e.end_time, e.confidence, e.completed, e.outside_semester
                 FROM events e JOIN courses c ON c.id = e.course_id
                 ORDER BY e.date, e.start_time, c.code",
                params![],
            )
            .await
            .map_err(storage_err)?;
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            loaded.events.push(row_to_event(&row)?);
        }

        let mut rows = self
            .conn
            .query(
                "SELECT id, course_id, events_created, events_superseded, events_removed,
                        committed_at
                 FROM imports ORDER BY committed_at",
                params![],
            )
            .await
            .map_err(storage_err)?;
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            loaded.imports.push(ImportRecord {
                import_id: parse_id(&row.get::<String>(0).map_err(storage_err)?)?,
                course_id: parse_id(&row.get::<String>(1).map_err(storage_err)?)?,
                events_created: row.get::<i64>(2).map_err(storage_err)? as usize,
                events_superseded: row.get::<i64>(3).map_err(storage_err)? as usize,
                events_removed: row.get::<i64>(4).map_err(storage_err)? as usize,
                committed_at: parse_timestamp(&row.get::<String>(5).map_err(storage_err)?)?,
            });
        }

        tracing::debug!(
            courses = loaded.courses.len(),
            events = loaded.events.len(),
            imports = loaded.imports.len(),
            "loaded course database"
        );
        Ok(loaded)
    }
}

// ---------------------------------------------------------------------------
// Row writers (shared by the connection and transactions)
// ---------------------------------------------------------------------------

async fn upsert_course(conn: &Connection, course: &Course) -> Result<()> {
    let instructor = course
        .instructor
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| SyllabusError::Storage(e.to_string()))?;
    let schedule = serde_json::to_string(&course.schedule)
        .map_err(|e| SyllabusError::Storage(e.to_string()))?;
    let grading = serde_json::to_string(&course.grading)
        .map_err(|e| SyllabusError::Storage(e.to_string()))?;

    conn.execute(
        "INSERT INTO courses (id, term, year, code, name, instructor_json, credits,
                              schedule_json, grading_json, source_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
           code = excluded.code,
           name = excluded.name,
           instructor_json = excluded.instructor_json,
           credits = excluded.credits,
           schedule_json = excluded.schedule_json,
           grading_json = excluded.grading_json,
           source_hash = excluded.source_hash,
           updated_at = excluded.updated_at",
        params![
            course.id.to_string(),
            course.semester.term.as_str(),
            i64::from(course.semester.year),
            course.code.as_str(),
            course.name.as_str(),
            instructor,
            course.credits.map(f64::from),
            schedule,
            grading,
            course.source_hash.as_deref(),
            course.created_at.to_rfc3339(),
            course.updated_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(storage_err)?;
    Ok(())
}

async fn upsert_event(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        "INSERT INTO events (id, course_id, kind, title, date, start_time, end_time,
                             confidence, completed, outside_semester)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
           kind = excluded.kind,
           title = excluded.title,
           date = excluded.date,
           start_time = excluded.start_time,
           end_time = excluded.end_time,
           confidence = excluded.confidence,
           completed = excluded.completed,
           outside_semester = excluded.outside_semester",
        params![
            event.id.to_string(),
            event.course_id.to_string(),
            event.kind.as_str(),
            event.title.as_str(),
            event.date.to_string(),
            event.time.map(|t| t.start.format(TIME_FORMAT).to_string()),
            event.time.map(|t| t.end.format(TIME_FORMAT).to_string()),
            f64::from(event.confidence),
            i64::from(event.completed),
            i64::from(event.outside_semester),
        ],
    )
    .await
    .map_err(storage_err)?;
    Ok(())
}

async fn delete_event(conn: &Connection, event_id: EventId) -> Result<()> {
    conn.execute(
        "DELETE FROM events WHERE id = ?1",
        params![event_id.to_string()],
    )
    .await
    .map_err(storage_err)?;
    Ok(())
}

async fn insert_import(conn: &Connection, record: &ImportRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO imports (id, course_id, events_created, events_superseded,
                              events_removed, committed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.import_id.to_string(),
            record.course_id.to_string(),
            record.events_created as i64,
            record.events_superseded as i64,
            record.events_removed as i64,
            record.committed_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(storage_err)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row readers
// ---------------------------------------------------------------------------

const TIME_FORMAT: &str = "%H:%M:%S";

fn row_to_course(row: &libsql::Row) -> Result<Course> {
    let term: String = row.get(1).map_err(storage_err)?;
    let year: i64 = row.get(2).map_err(storage_err)?;
    let instructor = match row.get::<String>(5).ok() {
        Some(json) => Some(parse_json(&json)?),
        None => None,
    };

    Ok(Course {
        id: parse_id(&row.get::<String>(0).map_err(storage_err)?)?,
        semester: SemesterKey::new(Term::from_str(&term)?, year as i32),
        code: row.get(3).map_err(storage_err)?,
        name: row.get(4).map_err(storage_err)?,
        instructor,
        credits: row.get::<f64>(6).ok().map(|c| c as f32),
        schedule: parse_json(&row.get::<String>(7).map_err(storage_err)?)?,
        grading: parse_json(&row.get::<String>(8).map_err(storage_err)?)?,
        source_hash: row.get::<String>(9).ok(),
        created_at: parse_timestamp(&row.get::<String>(10).map_err(storage_err)?)?,
        updated_at: parse_timestamp(&row.get::<String>(11).map_err(storage_err)?)?,
    })
}

fn row_to_event(row: &libsql::Row) -> Result<Event> {
    let kind: String = row.get(3).map_err(storage_err)?;
    let date: String = row.get(5).map_err(storage_err)?;
    let start = row.get::<String>(6).ok();
    let end = row.get::<String>(7).ok();
    let time = match (start, end) {
        (Some(start), Some(end)) => Some(TimeWindow::new(parse_time(&start)?, parse_time(&end)?)),
        _ => None,
    };

    Ok(Event {
        id: parse_id(&row.get::<String>(0).map_err(storage_err)?)?,
        course_id: parse_id(&row.get::<String>(1).map_err(storage_err)?)?,
        course_code: row.get(2).map_err(storage_err)?,
        kind: parse_kind(&kind)?,
        title: row.get(4).map_err(storage_err)?,
        date: date
            .parse::<NaiveDate>()
            .map_err(|e| SyllabusError::Storage(format!("invalid date '{date}': {e}")))?,
        time,
        confidence: row.get::<f64>(8).map_err(storage_err)? as f32,
        completed: row.get::<i64>(9).map_err(storage_err)? != 0,
        outside_semester: row.get::<i64>(10).map_err(storage_err)? != 0,
    })
}

fn parse_id<T: FromStr<Err = uuid::Error>>(s: &str) -> Result<T> {
    s.parse()
        .map_err(|e| SyllabusError::Storage(format!("invalid id '{s}': {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SyllabusError::Storage(format!("invalid timestamp '{s}': {e}")))
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .map_err(|e| SyllabusError::Storage(format!("invalid time '{s}': {e}")))
}

fn parse_kind(s: &str) -> Result<EventKind> {
    match s {
        "exam" => Ok(EventKind::Exam),
        "assignment" => Ok(EventKind::Assignment),
        "project" => Ok(EventKind::Project),
        "administrative" => Ok(EventKind::Administrative),
        other => Err(SyllabusError::Storage(format!("unknown event kind '{other}'"))),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| SyllabusError::Storage(format!("invalid json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syllabus_shared::{GradingComponent, Instructor, MeetingPattern};
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("syllabus_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sample_course() -> Course {
        let now = Utc::now();
        Course {
            id: CourseId::new(),
            code: "CS 101".into(),
            name: "Introduction to Programming".into(),
            semester: SemesterKey::new(Term::Fall, 2025),
            instructor: Some(Instructor {
                name: "Dr. Ada Lovelace".into(),
                email: Some("ada@example.edu".into()),
                office_hours: None,
            }),
            credits: Some(3.0),
            schedule: vec![MeetingPattern {
                days: vec![chrono::Weekday::Mon, chrono::Weekday::Wed],
                start: t(10, 0),
                end: t(10, 50),
                location: Some("Room 204".into()),
            }],
            grading: vec![GradingComponent {
                name: "Exams".into(),
                weight: 60.0,
            }],
            source_hash: Some("abc".into()),
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_event(course: &Course, time: Option<TimeWindow>) -> Event {
        Event {
            id: EventId::new(),
            course_id: course.id,
            course_code: course.code.clone(),
            kind: EventKind::Exam,
            title: "Midterm".into(),
            date: NaiveDate::from_ymd_opt(2025, 10, 14).unwrap(),
            time,
            confidence: 0.85,
            completed: false,
            outside_semester: false,
        }
    }

    fn record(course: &Course, created: usize) -> ImportRecord {
        ImportRecord {
            import_id: ImportId::new(),
            course_id: course.id,
            events_created: created,
            events_superseded: 0,
            events_removed: 0,
            committed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 3);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("syllabus_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 3);
    }

    #[tokio::test]
    async fn commit_roundtrip() {
        let storage = test_storage().await;
        let course = sample_course();
        let timed = sample_event(&course, Some(TimeWindow::new(t(10, 0), t(11, 0))));
        let untimed = sample_event(&course, None);

        storage
            .save_commit(
                &course,
                &[timed.clone(), untimed.clone()],
                &[],
                &record(&course, 2),
            )
            .await
            .unwrap();

        let loaded = storage.load_all().await.unwrap();
        assert_eq!(loaded.courses.len(), 1);
        let back = &loaded.courses[0];
        assert_eq!(back.code, "CS 101");
        assert_eq!(back.instructor, course.instructor);
        assert_eq!(back.schedule, course.schedule);
        assert_eq!(back.grading, course.grading);
        assert_eq!(back.semester, course.semester);

        assert_eq!(loaded.events.len(), 2);
        let timed_back = loaded.events.iter().find(|e| e.id == timed.id).unwrap();
        assert_eq!(timed_back.time, timed.time);
        assert_eq!(timed_back.course_code, "CS 101");
        let untimed_back = loaded.events.iter().find(|e| e.id == untimed.id).unwrap();
        assert!(untimed_back.time.is_none());

        assert_eq!(loaded.imports.len(), 1);
        assert_eq!(loaded.imports[0].events_created, 2);
    }

    #[tokio::test]
    async fn commit_upserts_by_id() {
        let storage = test_storage().await;
        let mut course = sample_course();
        let mut event = sample_event(&course, None);
        storage
            .save_commit(&course, &[event.clone()], &[], &record(&course, 1))
            .await
            .unwrap();

        course.name = "Programming I".into();
        event.title = "Midterm exam".into();
        storage
            .save_commit(&course, &[event.clone()], &[], &record(&course, 0))
            .await
            .unwrap();

        let loaded = storage.load_all().await.unwrap();
        assert_eq!(loaded.courses.len(), 1);
        assert_eq!(loaded.courses[0].name, "Programming I");
        assert_eq!(loaded.events.len(), 1);
        assert_eq!(loaded.events[0].title, "Midterm exam");
        assert_eq!(loaded.imports.len(), 2);
    }

    #[tokio::test]
    async fn commit_deletes_removed_events() {
        let storage = test_storage().await;
        let course = sample_course();
        let kept = sample_event(&course, None);
        let dropped = sample_event(&course, Some(TimeWindow::new(t(10, 0), t(11, 0))));
        storage
            .save_commit(
                &course,
                &[kept.clone(), dropped.clone()],
                &[],
                &record(&course, 2),
            )
            .await
            .unwrap();

        let rec = ImportRecord {
            events_removed: 1,
            ..record(&course, 0)
        };
        storage
            .save_commit(&course, &[kept.clone()], &[dropped.id], &rec)
            .await
            .unwrap();

        let loaded = storage.load_all().await.unwrap();
        assert_eq!(loaded.events.len(), 1);
        assert_eq!(loaded.events[0].id, kept.id);
        let last = loaded
            .imports
            .iter()
            .find(|r| r.import_id == rec.import_id)
            .unwrap();
        assert_eq!(last.events_removed, 1);
    }

    #[tokio::test]
    async fn failed_commit_leaves_nothing_behind() {
        let storage = test_storage().await;
        let course = sample_course();
        let event = sample_event(&course, None);
        let rec = record(&course, 1);
        storage
            .save_commit(&course, &[event.clone()], &[], &rec)
            .await
            .unwrap();

        // Reusing the import id violates the log's primary key after the
        // course and event rows were already written in the transaction.
        let mut renamed = course.clone();
        renamed.name = "Should not persist".into();
        let err = storage
            .save_commit(&renamed, &[event], &[], &rec)
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabusError::Storage(_)));

        let loaded = storage.load_all().await.unwrap();
        assert_eq!(loaded.courses[0].name, "Introduction to Programming");
    }

    #[tokio::test]
    async fn completion_flag_persists() {
        let storage = test_storage().await;
        let course = sample_course();
        let event = sample_event(&course, None);
        storage
            .save_commit(&course, &[event.clone()], &[], &record(&course, 1))
            .await
            .unwrap();

        storage.set_event_completed(event.id, true).await.unwrap();
        let loaded = storage.load_all().await.unwrap();
        assert!(loaded.events[0].completed);

        let err = storage
            .set_event_completed(EventId::new(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabusError::NotFound { .. }));
    }

    #[tokio::test]
    async fn course_update_persists() {
        let storage = test_storage().await;
        let mut course = sample_course();
        storage
            .save_commit(&course, &[], &[], &record(&course, 0))
            .await
            .unwrap();

        course.credits = Some(4.0);
        storage.save_course(&course).await.unwrap();
        let loaded = storage.load_all().await.unwrap();
        assert_eq!(loaded.courses[0].credits, Some(4.0));
    }
}
