//! Per-semester course registry with staged imports.
//!
//! Each semester owns one `RwLock`: commits, completions, and updates take the
//! write lock, lookups take the read lock and clone what they return. Staged
//! imports live outside the semester state and are invisible to lookups until
//! committed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use syllabus_shared::{
    Course, CourseId, CourseUpdate, Event, EventId, EventKey, ImportId, Result, SemesterKey,
    SyllabusError,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use crate::{ImportRecord, Storage};

/// Course data held between parsing and commit.
#[derive(Debug, Clone)]
pub struct StagedImport {
    pub import_id: ImportId,
    pub semester: SemesterKey,
    pub course: Course,
    pub events: Vec<Event>,
    pub staged_at: DateTime<Utc>,
}

/// A consistent read of one semester's committed state.
#[derive(Debug, Clone)]
pub struct SemesterSnapshot {
    pub semester: SemesterKey,
    /// Sorted by course code.
    pub courses: Vec<Course>,
    /// Sorted by date, time, course code, then title.
    pub events: Vec<Event>,
}

/// What committing a staged import would produce, computed without mutating.
#[derive(Debug, Clone)]
pub struct MergePreview {
    /// The course as it would be committed (existing id kept on re-import).
    pub course: Course,
    /// The staged events after supersede remapping.
    pub staged: Vec<Event>,
    /// The whole semester event set with the staged events merged in.
    pub events: Vec<Event>,
    pub events_created: usize,
    pub events_superseded: usize,
    /// Committed events of the same course the import no longer lists.
    pub removed: Vec<Event>,
    /// Committed copy of the same course, if this import re-imports it.
    pub existing: Option<Course>,
}

/// Result of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub course: Course,
    /// The committed events of this import.
    pub events: Vec<Event>,
    pub events_created: usize,
    pub events_superseded: usize,
    pub events_removed: usize,
}

#[derive(Debug, Clone, Default)]
struct SemesterState {
    courses: BTreeMap<CourseId, Course>,
    events: BTreeMap<EventId, Event>,
    imports: Vec<ImportRecord>,
}

impl SemesterState {
    fn course_by_code(&self, code: &str) -> Option<&Course> {
        self.courses
            .values()
            .find(|c| c.code.eq_ignore_ascii_case(code))
    }

    fn snapshot(&self, semester: SemesterKey) -> SemesterSnapshot {
        let mut courses: Vec<Course> = self.courses.values().cloned().collect();
        courses.sort_by(|a, b| a.code.cmp(&b.code).then(a.id.cmp(&b.id)));
        SemesterSnapshot {
            semester,
            courses,
            events: sorted_events(self.events.values().cloned()),
        }
    }
}

fn sorted_events(events: impl Iterator<Item = Event>) -> Vec<Event> {
    let mut events: Vec<Event> = events.collect();
    events.sort_by(|a, b| {
        (a.date, a.time, &a.course_code, &a.title, a.id).cmp(&(
            b.date,
            b.time,
            &b.course_code,
            &b.title,
            b.id,
        ))
    });
    events
}

// ---------------------------------------------------------------------------
// Merge planning
// ---------------------------------------------------------------------------

/// The writes a commit performs against one semester state.
///
/// A re-import replaces the course's event set: events matched by key keep
/// their id and completion flag, unmatched committed events are removed.
struct MergePlan {
    course: Course,
    staged: Vec<Event>,
    removed: Vec<Event>,
    created: usize,
    superseded: usize,
    existing: Option<Course>,
}

impl MergePlan {
    fn build(state: &SemesterState, staged: &StagedImport) -> Result<Self> {
        let mut keys: HashSet<EventKey> = HashSet::new();
        for event in &staged.events {
            if !keys.insert(event.key()) {
                return Err(SyllabusError::DuplicateEvent {
                    event_id: event.id.to_string(),
                    title: event.title.clone(),
                    date: event.date,
                });
            }
        }

        let existing = state.course_by_code(&staged.course.code).cloned();
        let mut course = staged.course.clone();
        if let Some(existing) = &existing {
            course.id = existing.id;
            course.created_at = existing.created_at;
            course.updated_at = Utc::now();
        }

        let committed: HashMap<EventKey, &Event> = state
            .events
            .values()
            .filter(|e| e.course_id == course.id)
            .map(|e| (e.key(), e))
            .collect();

        let mut created = 0;
        let mut superseded = 0;
        let mut replaced: HashSet<EventId> = HashSet::new();
        let staged_events = staged
            .events
            .iter()
            .map(|event| {
                let mut event = event.clone();
                event.course_id = course.id;
                event.course_code = course.code.clone();
                match committed.get(&event.key()) {
                    Some(previous) => {
                        event.id = previous.id;
                        event.completed |= previous.completed;
                        replaced.insert(previous.id);
                        superseded += 1;
                    }
                    None => created += 1,
                }
                event
            })
            .collect();

        let removed = sorted_events(
            committed
                .values()
                .filter(|e| !replaced.contains(&e.id))
                .map(|e| (*e).clone()),
        );

        Ok(Self {
            course,
            staged: staged_events,
            removed,
            created,
            superseded,
            existing,
        })
    }

    fn removed_ids(&self) -> Vec<EventId> {
        self.removed.iter().map(|e| e.id).collect()
    }

    fn apply(&self, state: &mut SemesterState) {
        state.courses.insert(self.course.id, self.course.clone());
        for event in &self.removed {
            state.events.remove(&event.id);
        }
        for event in &self.staged {
            state.events.insert(event.id, event.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// CourseStore
// ---------------------------------------------------------------------------

/// Registry of committed courses and events, grouped by semester.
pub struct CourseStore {
    semesters: Mutex<BTreeMap<SemesterKey, Arc<RwLock<SemesterState>>>>,
    staged: Mutex<HashMap<ImportId, StagedImport>>,
    storage: Option<Storage>,
}

impl Default for CourseStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl CourseStore {
    /// A store without persistence.
    pub fn in_memory() -> Self {
        Self {
            semesters: Mutex::new(BTreeMap::new()),
            staged: Mutex::new(HashMap::new()),
            storage: None,
        }
    }

    /// Open the database at `path` and load its committed state.
    pub async fn open(path: &Path) -> Result<Self> {
        let storage = Storage::open(path).await?;
        let loaded = storage.load_all().await?;

        let mut states: BTreeMap<SemesterKey, SemesterState> = BTreeMap::new();
        let mut owner: HashMap<CourseId, SemesterKey> = HashMap::new();
        for course in loaded.courses {
            owner.insert(course.id, course.semester);
            states
                .entry(course.semester)
                .or_default()
                .courses
                .insert(course.id, course);
        }
        for event in loaded.events {
            if let Some(state) = owner.get(&event.course_id).and_then(|k| states.get_mut(k)) {
                state.events.insert(event.id, event);
            }
        }
        for record in loaded.imports {
            if let Some(state) = owner.get(&record.course_id).and_then(|k| states.get_mut(k)) {
                state.imports.push(record);
            }
        }

        info!(path = %path.display(), semesters = states.len(), "opened course store");
        let semesters = states
            .into_iter()
            .map(|(key, state)| (key, Arc::new(RwLock::new(state))))
            .collect();
        Ok(Self {
            semesters: Mutex::new(semesters),
            staged: Mutex::new(HashMap::new()),
            storage: Some(storage),
        })
    }

    async fn lock_for(&self, semester: SemesterKey) -> Arc<RwLock<SemesterState>> {
        self.semesters
            .lock()
            .await
            .entry(semester)
            .or_default()
            .clone()
    }

    async fn existing_lock(&self, semester: SemesterKey) -> Option<Arc<RwLock<SemesterState>>> {
        self.semesters.lock().await.get(&semester).cloned()
    }

    /// Find the semester lock owning `course_id`.
    async fn lock_for_course(&self, course_id: CourseId) -> Result<Arc<RwLock<SemesterState>>> {
        let locks: Vec<_> = self.semesters.lock().await.values().cloned().collect();
        for lock in locks {
            if lock.read().await.courses.contains_key(&course_id) {
                return Ok(lock);
            }
        }
        Err(SyllabusError::not_found(format!("course {course_id}")))
    }

    // -----------------------------------------------------------------------
    // Staging
    // -----------------------------------------------------------------------

    /// Hold a course and its events as an uncommitted import.
    pub async fn stage(&self, course: Course, events: Vec<Event>) -> Result<ImportId> {
        if let Some(stray) = events.iter().find(|e| e.course_id != course.id) {
            return Err(SyllabusError::validation(format!(
                "event '{}' does not belong to course {}",
                stray.title, course.code
            )));
        }

        let import_id = ImportId::new();
        debug!(%import_id, course = %course.code, events = events.len(), "staged import");
        self.staged.lock().await.insert(
            import_id,
            StagedImport {
                import_id,
                semester: course.semester,
                course,
                events,
                staged_at: Utc::now(),
            },
        );
        Ok(import_id)
    }

    /// Discard staged imports older than `max_age`, returning their ids.
    pub async fn expire_staged(&self, max_age: Duration) -> Vec<ImportId> {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Vec::new();
        };

        let mut staged = self.staged.lock().await;
        let expired: Vec<ImportId> = staged
            .values()
            .filter(|s| s.staged_at <= cutoff)
            .map(|s| s.import_id)
            .collect();
        for import_id in &expired {
            staged.remove(import_id);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "discarded abandoned staged imports");
        }
        expired
    }

    /// A copy of a staged import.
    pub async fn staged(&self, import_id: ImportId) -> Result<StagedImport> {
        self.staged
            .lock()
            .await
            .get(&import_id)
            .cloned()
            .ok_or_else(|| SyllabusError::not_found(format!("staged import {import_id}")))
    }

    /// Merge a staged import onto a snapshot of its semester, without
    /// committing anything.
    pub async fn preview_merge(&self, import_id: ImportId) -> Result<MergePreview> {
        let staged = self.staged(import_id).await?;
        let lock = self.existing_lock(staged.semester).await;

        let (plan, events) = match lock {
            Some(lock) => {
                let state = lock.read().await;
                let plan = MergePlan::build(&state, &staged)?;
                let mut merged = (*state).clone();
                plan.apply(&mut merged);
                (plan, sorted_events(merged.events.into_values()))
            }
            None => {
                let plan = MergePlan::build(&SemesterState::default(), &staged)?;
                let events = sorted_events(plan.staged.iter().cloned());
                (plan, events)
            }
        };

        Ok(MergePreview {
            course: plan.course,
            staged: plan.staged,
            events,
            events_created: plan.created,
            events_superseded: plan.superseded,
            removed: plan.removed,
            existing: plan.existing,
        })
    }

    /// Atomically merge a staged import into its semester.
    ///
    /// On error nothing changes and the import stays staged, so the caller
    /// can still roll it back.
    #[instrument(skip_all, fields(import_id = %import_id))]
    pub async fn commit(&self, import_id: ImportId) -> Result<CommitOutcome> {
        let staged = self
            .staged
            .lock()
            .await
            .remove(&import_id)
            .ok_or_else(|| SyllabusError::not_found(format!("staged import {import_id}")))?;

        match self.commit_staged(&staged).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.staged.lock().await.insert(import_id, staged);
                Err(e)
            }
        }
    }

    async fn commit_staged(&self, staged: &StagedImport) -> Result<CommitOutcome> {
        let lock = self.lock_for(staged.semester).await;
        let mut state = lock.write().await;

        let plan = MergePlan::build(&state, staged)?;
        let record = ImportRecord {
            import_id: staged.import_id,
            course_id: plan.course.id,
            events_created: plan.created,
            events_superseded: plan.superseded,
            events_removed: plan.removed.len(),
            committed_at: Utc::now(),
        };
        if let Some(storage) = &self.storage {
            storage
                .save_commit(&plan.course, &plan.staged, &plan.removed_ids(), &record)
                .await?;
        }
        plan.apply(&mut state);
        state.imports.push(record);

        info!(
            course = %plan.course.code,
            semester = %staged.semester,
            created = plan.created,
            superseded = plan.superseded,
            removed = plan.removed.len(),
            "committed import"
        );
        Ok(CommitOutcome {
            events_removed: plan.removed.len(),
            course: plan.course,
            events: sorted_events(plan.staged.into_iter()),
            events_created: plan.created,
            events_superseded: plan.superseded,
        })
    }

    /// Discard a staged import.
    pub async fn rollback(&self, import_id: ImportId) -> Result<()> {
        match self.staged.lock().await.remove(&import_id) {
            Some(_) => {
                debug!(%import_id, "rolled back staged import");
                Ok(())
            }
            None => Err(SyllabusError::not_found(format!(
                "staged import {import_id}"
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Lookups (committed state only)
    // -----------------------------------------------------------------------

    /// Semesters holding at least one committed course, oldest first.
    pub async fn semesters(&self) -> Vec<SemesterKey> {
        let entries: Vec<_> = self
            .semesters
            .lock()
            .await
            .iter()
            .map(|(k, l)| (*k, l.clone()))
            .collect();
        let mut keys = Vec::new();
        for (key, lock) in entries {
            if !lock.read().await.courses.is_empty() {
                keys.push(key);
            }
        }
        keys
    }

    /// Committed courses of a semester, sorted by code.
    pub async fn list_courses(&self, semester: SemesterKey) -> Vec<Course> {
        self.semester_events(semester).await.courses
    }

    /// Consistent snapshot of a semester's courses and events.
    pub async fn semester_events(&self, semester: SemesterKey) -> SemesterSnapshot {
        match self.existing_lock(semester).await {
            Some(lock) => lock.read().await.snapshot(semester),
            None => SemesterSnapshot {
                semester,
                courses: Vec::new(),
                events: Vec::new(),
            },
        }
    }

    pub async fn get_course(&self, course_id: CourseId) -> Result<Course> {
        let lock = self.lock_for_course(course_id).await?;
        let state = lock.read().await;
        state
            .courses
            .get(&course_id)
            .cloned()
            .ok_or_else(|| SyllabusError::not_found(format!("course {course_id}")))
    }

    /// A committed course matched by code within a semester.
    pub async fn find_course(&self, semester: SemesterKey, code: &str) -> Option<Course> {
        let lock = self.existing_lock(semester).await?;
        let state = lock.read().await;
        state.course_by_code(code).cloned()
    }

    /// Events of one course, sorted by date.
    pub async fn course_events(&self, course_id: CourseId) -> Result<Vec<Event>> {
        let lock = self.lock_for_course(course_id).await?;
        let state = lock.read().await;
        Ok(sorted_events(
            state
                .events
                .values()
                .filter(|e| e.course_id == course_id)
                .cloned(),
        ))
    }

    /// Committed imports of one course, oldest first.
    pub async fn import_history(&self, course_id: CourseId) -> Result<Vec<ImportRecord>> {
        let lock = self.lock_for_course(course_id).await?;
        let state = lock.read().await;
        Ok(state
            .imports
            .iter()
            .filter(|r| r.course_id == course_id)
            .cloned()
            .collect())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Set an event's completion flag. Completing twice is a no-op.
    #[instrument(skip_all, fields(course_id = %course_id, event_id = %event_id))]
    pub async fn mark_event_complete(&self, course_id: CourseId, event_id: EventId) -> Result<Event> {
        let lock = self.lock_for_course(course_id).await?;
        let mut state = lock.write().await;

        let event = match state.events.get(&event_id) {
            Some(event) if event.course_id == course_id => event.clone(),
            _ => {
                return Err(SyllabusError::not_found(format!(
                    "event {event_id} in course {course_id}"
                )));
            }
        };
        if event.completed {
            return Ok(event);
        }

        if let Some(storage) = &self.storage {
            storage.set_event_completed(event_id, true).await?;
        }
        let event = Event {
            completed: true,
            ..event
        };
        state.events.insert(event_id, event.clone());
        info!(title = %event.title, "event marked complete");
        Ok(event)
    }

    /// Apply an explicit field-wise update to a committed course.
    #[instrument(skip_all, fields(course_id = %course_id))]
    pub async fn update_course(&self, course_id: CourseId, update: &CourseUpdate) -> Result<Course> {
        let lock = self.lock_for_course(course_id).await?;
        let mut state = lock.write().await;

        let mut course = state
            .courses
            .get(&course_id)
            .cloned()
            .ok_or_else(|| SyllabusError::not_found(format!("course {course_id}")))?;
        if update.is_empty() {
            return Ok(course);
        }
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(SyllabusError::validation("course name cannot be empty"));
            }
        }

        update.apply(&mut course);
        if let Some(storage) = &self.storage {
            storage.save_course(&course).await?;
        }
        state.courses.insert(course_id, course.clone());
        info!(course = %course.code, "course updated");
        Ok(course)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use syllabus_shared::{EventKind, Term, TimeWindow};
    use uuid::Uuid;

    fn fall() -> SemesterKey {
        SemesterKey::new(Term::Fall, 2025)
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn course(code: &str, semester: SemesterKey) -> Course {
        let now = Utc::now();
        Course {
            id: CourseId::new(),
            code: code.into(),
            name: format!("{code} course"),
            semester,
            instructor: None,
            credits: None,
            schedule: vec![],
            grading: vec![],
            source_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn event(course: &Course, kind: EventKind, title: &str, date: NaiveDate) -> Event {
        Event {
            id: EventId::new(),
            course_id: course.id,
            course_code: course.code.clone(),
            kind,
            title: title.into(),
            date,
            time: None,
            confidence: 0.8,
            completed: false,
            outside_semester: false,
        }
    }

    /// A fresh copy of the same syllabus, as a re-parse would produce it.
    fn reparse(c: &Course, events: &[Event]) -> (Course, Vec<Event>) {
        let mut course = c.clone();
        course.id = CourseId::new();
        let events = events
            .iter()
            .map(|e| Event {
                id: EventId::new(),
                course_id: course.id,
                ..e.clone()
            })
            .collect();
        (course, events)
    }

    fn temp_db() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("syllabus_test_{}.db", Uuid::now_v7()))
    }

    #[tokio::test]
    async fn staged_data_is_invisible_until_commit() {
        let store = CourseStore::in_memory();
        let c = course("CS 101", fall());
        let events = vec![event(&c, EventKind::Exam, "Midterm", d(10, 14))];
        let id = store.stage(c.clone(), events).await.unwrap();

        assert!(store.list_courses(fall()).await.is_empty());
        assert!(store.semester_events(fall()).await.events.is_empty());
        assert!(store.get_course(c.id).await.is_err());

        let outcome = store.commit(id).await.unwrap();
        assert_eq!(outcome.events_created, 1);
        assert_eq!(store.list_courses(fall()).await.len(), 1);
        assert_eq!(store.course_events(c.id).await.unwrap().len(), 1);
        assert_eq!(store.semesters().await, vec![fall()]);
    }

    #[tokio::test]
    async fn reimport_is_idempotent_and_keeps_ids() {
        let store = CourseStore::in_memory();
        let c = course("CS 101", fall());
        let events = vec![
            event(&c, EventKind::Exam, "Midterm", d(10, 14)),
            event(&c, EventKind::Assignment, "Homework 1", d(9, 12)),
        ];
        let id = store.stage(c.clone(), events.clone()).await.unwrap();
        store.commit(id).await.unwrap();
        let first = store.course_events(c.id).await.unwrap();
        store
            .mark_event_complete(c.id, first[0].id)
            .await
            .unwrap();

        let (again, again_events) = reparse(&c, &events);
        let id = store.stage(again, again_events).await.unwrap();
        let outcome = store.commit(id).await.unwrap();
        assert_eq!(outcome.course.id, c.id);
        assert_eq!(outcome.events_created, 0);
        assert_eq!(outcome.events_superseded, 2);

        let second = store.course_events(c.id).await.unwrap();
        assert_eq!(second.len(), 2);
        let ids = |v: &[Event]| v.iter().map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert!(second[0].completed, "completion survives re-import");
        assert_eq!(store.list_courses(fall()).await.len(), 1);
        assert_eq!(store.import_history(c.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reimport_removes_events_missing_from_new_syllabus() {
        let store = CourseStore::in_memory();
        let c = course("CS 101", fall());
        let old = vec![
            event(&c, EventKind::Exam, "Midterm", d(10, 14)),
            event(&c, EventKind::Project, "Project", d(11, 20)),
        ];
        let id = store.stage(c.clone(), old.clone()).await.unwrap();
        store.commit(id).await.unwrap();

        let (again, mut new_events) = reparse(&c, &old[..1]);
        new_events.push(event(&again, EventKind::Exam, "Final", d(12, 15)));
        let id = store.stage(again, new_events).await.unwrap();
        let preview = store.preview_merge(id).await.unwrap();
        assert_eq!(preview.removed.len(), 1);
        assert_eq!(preview.removed[0].title, "Project");
        assert_eq!(preview.events.len(), 2);

        let outcome = store.commit(id).await.unwrap();
        assert_eq!(outcome.events_created, 1);
        assert_eq!(outcome.events_superseded, 1);
        assert_eq!(outcome.events_removed, 1);
        let titles: Vec<_> = store
            .course_events(c.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Midterm", "Final"]);
    }

    #[tokio::test]
    async fn rescheduled_event_replaces_old_date() {
        let store = CourseStore::in_memory();
        let c = course("CS 101", fall());
        let mut midterm = event(&c, EventKind::Exam, "Midterm", d(10, 14));
        midterm.time = Some(TimeWindow::new(t(10, 0), t(11, 0)));
        let homework = event(&c, EventKind::Assignment, "Homework 1", d(9, 12));
        let id = store
            .stage(c.clone(), vec![midterm.clone(), homework.clone()])
            .await
            .unwrap();
        store.commit(id).await.unwrap();
        store.mark_event_complete(c.id, homework.id).await.unwrap();

        let (again, mut events) = reparse(&c, &[midterm, homework.clone()]);
        events[0].date = d(10, 16);
        let id = store.stage(again, events).await.unwrap();
        let outcome = store.commit(id).await.unwrap();
        assert_eq!(outcome.events_created, 1);
        assert_eq!(outcome.events_superseded, 1);
        assert_eq!(outcome.events_removed, 1);

        let events = store.course_events(c.id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, homework.id);
        assert!(events[0].completed);
        assert_eq!(events[1].date, d(10, 16));
        assert!(events.iter().all(|e| e.date != d(10, 14)));
    }

    #[tokio::test]
    async fn removed_events_stay_gone_after_reopen() {
        let path = temp_db();
        let c = course("CS 101", fall());
        let old = vec![
            event(&c, EventKind::Exam, "Midterm", d(10, 14)),
            event(&c, EventKind::Project, "Project", d(11, 20)),
        ];
        {
            let store = CourseStore::open(&path).await.unwrap();
            let id = store.stage(c.clone(), old.clone()).await.unwrap();
            store.commit(id).await.unwrap();
            let (again, events) = reparse(&c, &old[..1]);
            let id = store.stage(again, events).await.unwrap();
            store.commit(id).await.unwrap();
        }

        let store = CourseStore::open(&path).await.unwrap();
        let events = store.course_events(c.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, old[0].id);
        let history = store.import_history(c.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].events_removed, 1);
    }

    #[tokio::test]
    async fn duplicate_staged_events_fail_without_changes() {
        let store = CourseStore::in_memory();
        let c = course("CS 101", fall());
        let events = vec![
            event(&c, EventKind::Exam, "Midterm", d(10, 14)),
            event(&c, EventKind::Exam, "Midterm exam", d(10, 14)),
        ];
        let id = store.stage(c.clone(), events).await.unwrap();

        let err = store.commit(id).await.unwrap_err();
        match err {
            SyllabusError::DuplicateEvent { title, date, .. } => {
                assert_eq!(title, "Midterm exam");
                assert_eq!(date, d(10, 14));
            }
            other => panic!("expected DuplicateEvent, got {other:?}"),
        }
        assert!(store.list_courses(fall()).await.is_empty());

        // Still staged, so it can be rolled back exactly once.
        store.rollback(id).await.unwrap();
        assert!(matches!(
            store.rollback(id).await,
            Err(SyllabusError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn abandoned_stages_expire() {
        let store = CourseStore::in_memory();
        let c = course("CS 101", fall());
        let id = store
            .stage(c.clone(), vec![event(&c, EventKind::Exam, "Midterm", d(10, 14))])
            .await
            .unwrap();

        assert!(store.expire_staged(Duration::from_secs(3600)).await.is_empty());
        assert!(store.staged(id).await.is_ok());
        assert!(store.expire_staged(Duration::MAX).await.is_empty());

        assert_eq!(store.expire_staged(Duration::ZERO).await, vec![id]);
        assert!(matches!(
            store.staged(id).await,
            Err(SyllabusError::NotFound { .. })
        ));
        assert!(store.commit(id).await.is_err());
        assert!(store.list_courses(fall()).await.is_empty());
    }

    #[tokio::test]
    async fn commit_unknown_import_is_not_found() {
        let store = CourseStore::in_memory();
        let err = store.commit(ImportId::new()).await.unwrap_err();
        assert!(matches!(err, SyllabusError::NotFound { .. }));
    }

    #[tokio::test]
    async fn stage_rejects_foreign_events() {
        let store = CourseStore::in_memory();
        let a = course("CS 101", fall());
        let b = course("MATH 221", fall());
        let err = store
            .stage(a, vec![event(&b, EventKind::Exam, "Midterm", d(10, 14))])
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabusError::Validation { .. }));
    }

    #[tokio::test]
    async fn preview_merge_does_not_mutate() {
        let store = CourseStore::in_memory();
        let a = course("CS 101", fall());
        let id = store
            .stage(a.clone(), vec![event(&a, EventKind::Exam, "Midterm", d(10, 14))])
            .await
            .unwrap();
        store.commit(id).await.unwrap();

        let b = course("MATH 221", fall());
        let id = store
            .stage(b.clone(), vec![event(&b, EventKind::Exam, "Exam 1", d(10, 14))])
            .await
            .unwrap();
        let preview = store.preview_merge(id).await.unwrap();
        assert_eq!(preview.events.len(), 2);
        assert_eq!(preview.staged.len(), 1);
        assert!(preview.existing.is_none());

        assert_eq!(store.semester_events(fall()).await.events.len(), 1);
        assert!(store.staged(id).await.is_ok());
    }

    #[tokio::test]
    async fn semesters_are_isolated() {
        let store = CourseStore::in_memory();
        let spring = SemesterKey::new(Term::Spring, 2026);
        let a = course("CS 101", fall());
        let b = course("CS 101", spring);
        for c in [&a, &b] {
            let id = store.stage(c.clone(), vec![]).await.unwrap();
            store.commit(id).await.unwrap();
        }
        assert_eq!(store.list_courses(fall()).await[0].id, a.id);
        assert_eq!(store.list_courses(spring).await[0].id, b.id);
        assert_eq!(store.semesters().await, vec![fall(), spring]);
    }

    #[tokio::test]
    async fn concurrent_commits_to_one_semester() {
        let store = Arc::new(CourseStore::in_memory());
        let c = course("CS 101", fall());
        let events = vec![event(&c, EventKind::Exam, "Midterm", d(10, 14))];

        let mut handles = Vec::new();
        for _ in 0..8 {
            let (copy, copy_events) = reparse(&c, &events);
            let id = store.stage(copy, copy_events).await.unwrap();
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.commit(id).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = store.semester_events(fall()).await;
        assert_eq!(snapshot.courses.len(), 1);
        assert_eq!(snapshot.events.len(), 1);
    }

    #[tokio::test]
    async fn mark_complete_checks_ownership() {
        let store = CourseStore::in_memory();
        let a = course("CS 101", fall());
        let b = course("MATH 221", fall());
        let ev = event(&a, EventKind::Exam, "Midterm", d(10, 14));
        for (c, events) in [(&a, vec![ev.clone()]), (&b, vec![])] {
            let id = store.stage(c.clone(), events).await.unwrap();
            store.commit(id).await.unwrap();
        }

        let err = store.mark_event_complete(b.id, ev.id).await.unwrap_err();
        assert!(matches!(err, SyllabusError::NotFound { .. }));
        let err = store
            .mark_event_complete(CourseId::new(), ev.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SyllabusError::NotFound { .. }));

        assert!(store.mark_event_complete(a.id, ev.id).await.unwrap().completed);
        assert!(store.mark_event_complete(a.id, ev.id).await.unwrap().completed);
    }

    #[tokio::test]
    async fn update_course_fields() {
        let store = CourseStore::in_memory();
        let c = course("CS 101", fall());
        let id = store.stage(c.clone(), vec![]).await.unwrap();
        store.commit(id).await.unwrap();

        let update = CourseUpdate {
            credits: Some(4.0),
            ..Default::default()
        };
        let updated = store.update_course(c.id, &update).await.unwrap();
        assert_eq!(updated.credits, Some(4.0));
        assert_eq!(store.get_course(c.id).await.unwrap().credits, Some(4.0));

        let blank = CourseUpdate {
            name: Some("  ".into()),
            ..Default::default()
        };
        assert!(store.update_course(c.id, &blank).await.is_err());
        assert_eq!(store.get_course(c.id).await.unwrap().name, c.name);
    }

    #[tokio::test]
    async fn persisted_state_reloads() {
        let path = temp_db();
        let c = course("CS 101", fall());
        let mut ev = event(&c, EventKind::Exam, "Midterm", d(10, 14));
        ev.time = Some(TimeWindow::new(t(10, 0), t(11, 0)));
        {
            let store = CourseStore::open(&path).await.unwrap();
            let id = store.stage(c.clone(), vec![ev.clone()]).await.unwrap();
            store.commit(id).await.unwrap();
            store.mark_event_complete(c.id, ev.id).await.unwrap();
        }

        let store = CourseStore::open(&path).await.unwrap();
        assert_eq!(store.semesters().await, vec![fall()]);
        let events = store.course_events(c.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, ev.time);
        assert!(events[0].completed);
        assert_eq!(store.import_history(c.id).await.unwrap().len(), 1);
        assert_eq!(
            store.find_course(fall(), "cs 101").await.map(|c| c.id),
            Some(c.id)
        );
    }
}
