use crate::errors::{AppError, AppResult};
use crate::models::{
    AppSettings, CanvasStroke, CompletionStatus, DayCanvas, EnergyLevel, Habit, HabitCompletion, HabitSummary,
    JournalEntry, JournalSummary, LayoutState, MoodEntry, MoodLevel, MoodSummary, MoodTag, MoodUpdate, Note,
    NoteType, NoteUpdate, NotesSummary, PomodoroSession, PomodoroSummary, SessionType,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");
pub const SCHEMA_VERSION: i64 = 3;

const SETTINGS_KEY: &str = "app";
const LAYOUT_KEY: &str = "layout";

const HABIT_NAME_MAX: usize = 100;
const NOTE_CONTENT_MAX: usize = 5000;
const MOOD_NOTE_MAX: usize = 500;

const HABIT_COLUMNS: &str = "id, name, archived, created_at, updated_at";
const COMPLETION_COLUMNS: &str = "id, habit_id, date, status, created_at, updated_at";
const MOOD_COLUMNS: &str = "id, date, mood, energy, tags_json, note, created_at, updated_at";
const NOTE_COLUMNS: &str = "id, date, content, note_type, tags_json, pinned, archived, created_at, updated_at";
const JOURNAL_COLUMNS: &str = "id, date, content, prompt, word_count, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, date, session_type, duration_secs, completed_at, created_at, updated_at";

/// Embedded store shared by every widget. Each widget owns its own tables;
/// the single connection serialises access.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };

        db.ensure_schema_version()?;
        db.ensure_default_settings()?;

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    fn ensure_schema_version(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if current > SCHEMA_VERSION {
            return Err(AppError::Internal(format!(
                "database schema v{} is newer than supported v{}",
                current, SCHEMA_VERSION
            )));
        }
        if current < SCHEMA_VERSION {
            tracing::info!(from = current, to = SCHEMA_VERSION, "upgrading database schema version");
            conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
        }
        Ok(())
    }

    pub fn schema_version(&self) -> AppResult<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    // ─── Habits ─────────────────────────────────────────────────────────────

    pub fn add_habit(&self, name: &str) -> AppResult<Habit> {
        let name = validate_text("habit name", name, HABIT_NAME_MAX)?;
        let now = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO habits (name, archived, created_at, updated_at) VALUES (?1, 0, ?2, ?2)",
            params![name, now.to_rfc3339()],
        )?;
        Ok(Habit {
            id: conn.last_insert_rowid(),
            name,
            archived: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Active (non-archived) habits in creation order.
    pub fn list_habits(&self) -> AppResult<Vec<Habit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM habits WHERE archived = 0 ORDER BY created_at ASC, id ASC",
            HABIT_COLUMNS
        ))?;
        let rows = stmt.query_map([], parse_habit_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_all_habits(&self) -> AppResult<Vec<Habit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM habits ORDER BY created_at ASC, id ASC",
            HABIT_COLUMNS
        ))?;
        let rows = stmt.query_map([], parse_habit_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_habit(&self, id: i64) -> AppResult<Option<Habit>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM habits WHERE id = ?1", HABIT_COLUMNS),
            [id],
            parse_habit_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn rename_habit(&self, id: i64, name: &str) -> AppResult<bool> {
        let name = validate_text("habit name", name, HABIT_NAME_MAX)?;
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE habits SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, Utc::now().to_rfc3339(), id],
        )?;
        Ok(changed > 0)
    }

    pub fn set_habit_archived(&self, id: i64, archived: bool) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE habits SET archived = ?1, updated_at = ?2 WHERE id = ?3",
            params![archived, Utc::now().to_rfc3339(), id],
        )?;
        Ok(changed > 0)
    }

    pub fn archive_habit(&self, id: i64) -> AppResult<bool> {
        self.set_habit_archived(id, true)
    }

    /// Removes a habit together with all of its completions. Either both go
    /// or neither does.
    pub fn delete_habit(&self, id: i64) -> AppResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed_completions = tx.execute("DELETE FROM habit_completions WHERE habit_id = ?1", [id])?;
        let removed = tx.execute("DELETE FROM habits WHERE id = ?1", [id])?;
        tx.commit()?;
        if removed > 0 {
            tracing::debug!(habit_id = id, removed_completions, "deleted habit");
        }
        Ok(removed > 0)
    }

    pub fn completions_for_date(&self, date: NaiveDate) -> AppResult<Vec<HabitCompletion>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM habit_completions WHERE date = ?1 ORDER BY habit_id ASC",
            COMPLETION_COLUMNS
        ))?;
        let rows = stmt.query_map([date], parse_completion_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_completion(&self, habit_id: i64, date: NaiveDate) -> AppResult<Option<HabitCompletion>> {
        let conn = self.lock()?;
        select_completion(&conn, habit_id, date)
    }

    /// Flips a habit's record for a day: absent becomes `done`, present is
    /// removed. Returns the resulting status.
    pub fn toggle_completion(&self, habit_id: i64, date: NaiveDate) -> AppResult<Option<CompletionStatus>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        ensure_habit_exists(&tx, habit_id)?;

        let outcome = match select_completion(&tx, habit_id, date)? {
            Some(existing) => {
                tx.execute("DELETE FROM habit_completions WHERE id = ?1", [existing.id])?;
                None
            }
            None => {
                let now = Utc::now().to_rfc3339();
                tx.execute(
                    "INSERT INTO habit_completions (habit_id, date, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![habit_id, date, CompletionStatus::Done.as_str(), now],
                )?;
                Some(CompletionStatus::Done)
            }
        };
        tx.commit()?;
        Ok(outcome)
    }

    pub fn set_habit_status(&self, habit_id: i64, date: NaiveDate, status: CompletionStatus) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        ensure_habit_exists(&tx, habit_id)?;
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO habit_completions (habit_id, date, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(habit_id, date) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at",
            params![habit_id, date, status.as_str(), now],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn completion_history(&self, habit_id: i64) -> AppResult<BTreeMap<NaiveDate, CompletionStatus>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT date, status FROM habit_completions WHERE habit_id = ?1")?;
        let mut rows = stmt.query([habit_id])?;
        let mut history = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let date: NaiveDate = row.get(0)?;
            let status = CompletionStatus::parse(&row.get::<_, String>(1)?)?;
            history.insert(date, status);
        }
        Ok(history)
    }

    pub fn count_completions(&self, habit_id: i64) -> AppResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM habit_completions WHERE habit_id = ?1",
            [habit_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn habit_summary(&self, date: NaiveDate) -> AppResult<HabitSummary> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row("SELECT COUNT(1) FROM habits WHERE archived = 0", [], |row| row.get(0))?;
        let completed: i64 = conn.query_row(
            "SELECT COUNT(1) FROM habit_completions c
             JOIN habits h ON h.id = c.habit_id
             WHERE c.date = ?1 AND c.status = 'done' AND h.archived = 0",
            [date],
            |row| row.get(0),
        )?;
        let percentage = if total > 0 {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };
        Ok(HabitSummary {
            completed: completed as usize,
            total: total as usize,
            percentage,
        })
    }

    // ─── Mood ───────────────────────────────────────────────────────────────

    pub fn log_mood(
        &self,
        date: NaiveDate,
        mood: MoodLevel,
        energy: Option<EnergyLevel>,
        tags: &[MoodTag],
        note: Option<&str>,
    ) -> AppResult<MoodEntry> {
        let note = validate_optional_text("mood note", note, MOOD_NOTE_MAX)?;
        let now = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO moods (date, mood, energy, tags_json, note, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                date,
                mood.value(),
                energy.map(EnergyLevel::value),
                serde_json::to_string(tags)?,
                note,
                now.to_rfc3339(),
            ],
        )?;
        Ok(MoodEntry {
            id: conn.last_insert_rowid(),
            date,
            mood,
            energy,
            tags: tags.to_vec(),
            note,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_mood_entry(&self, id: i64) -> AppResult<Option<MoodEntry>> {
        let conn = self.lock()?;
        select_mood(&conn, id)
    }

    pub fn update_mood_entry(&self, id: i64, update: MoodUpdate) -> AppResult<bool> {
        let note = validate_optional_text("mood note", update.note.as_deref(), MOOD_NOTE_MAX)?;
        let conn = self.lock()?;
        let Some(mut entry) = select_mood(&conn, id)? else {
            return Ok(false);
        };
        if let Some(mood) = update.mood {
            entry.mood = mood;
        }
        if let Some(energy) = update.energy {
            entry.energy = Some(energy);
        }
        if let Some(tags) = update.tags {
            entry.tags = tags;
        }
        if note.is_some() {
            entry.note = note;
        }
        let changed = conn.execute(
            "UPDATE moods SET mood = ?1, energy = ?2, tags_json = ?3, note = ?4, updated_at = ?5 WHERE id = ?6",
            params![
                entry.mood.value(),
                entry.energy.map(EnergyLevel::value),
                serde_json::to_string(&entry.tags)?,
                entry.note,
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_mood_entry(&self, id: i64) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM moods WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Entries for a day, oldest first.
    pub fn moods_for_date(&self, date: NaiveDate) -> AppResult<Vec<MoodEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM moods WHERE date = ?1 ORDER BY created_at ASC, id ASC",
            MOOD_COLUMNS
        ))?;
        let rows = stmt.query_map([date], parse_mood_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn latest_mood_for_date(&self, date: NaiveDate) -> AppResult<Option<MoodEntry>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM moods WHERE date = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                MOOD_COLUMNS
            ),
            [date],
            parse_mood_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Entries with `start <= date <= end`.
    pub fn moods_for_range(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<MoodEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM moods WHERE date >= ?1 AND date <= ?2 ORDER BY date ASC, created_at ASC, id ASC",
            MOOD_COLUMNS
        ))?;
        let rows = stmt.query_map([start, end], parse_mood_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn average_mood_for_date(&self, date: NaiveDate) -> AppResult<Option<f64>> {
        let conn = self.lock()?;
        let average: Option<f64> = conn.query_row("SELECT AVG(mood) FROM moods WHERE date = ?1", [date], |row| {
            row.get(0)
        })?;
        Ok(average.map(round_one_decimal))
    }

    pub fn mood_summary(&self, date: NaiveDate) -> AppResult<MoodSummary> {
        let count = {
            let conn = self.lock()?;
            let count: i64 = conn.query_row("SELECT COUNT(1) FROM moods WHERE date = ?1", [date], |row| row.get(0))?;
            count as usize
        };
        if count == 0 {
            return Ok(MoodSummary { mood: None, count: 0 });
        }
        let latest = self.latest_mood_for_date(date)?;
        Ok(MoodSummary {
            mood: latest.map(|entry| entry.mood),
            count,
        })
    }

    // ─── Notes ──────────────────────────────────────────────────────────────

    pub fn add_note(&self, date: NaiveDate, content: &str, note_type: NoteType, tags: &[String]) -> AppResult<Note> {
        let content = validate_text("note content", content, NOTE_CONTENT_MAX)?;
        let now = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notes (date, content, note_type, tags_json, pinned, archived, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?5)",
            params![date, content, note_type.as_str(), serde_json::to_string(tags)?, now.to_rfc3339()],
        )?;
        Ok(Note {
            id: conn.last_insert_rowid(),
            date,
            content,
            note_type,
            tags: tags.to_vec(),
            pinned: false,
            archived: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_note(&self, id: i64) -> AppResult<Option<Note>> {
        let conn = self.lock()?;
        select_note(&conn, id)
    }

    pub fn update_note(&self, id: i64, update: NoteUpdate) -> AppResult<bool> {
        let content = match update.content.as_deref() {
            Some(content) => Some(validate_text("note content", content, NOTE_CONTENT_MAX)?),
            None => None,
        };
        let conn = self.lock()?;
        let Some(mut note) = select_note(&conn, id)? else {
            return Ok(false);
        };
        if let Some(content) = content {
            note.content = content;
        }
        if let Some(note_type) = update.note_type {
            note.note_type = note_type;
        }
        if let Some(tags) = update.tags {
            note.tags = tags;
        }
        let changed = conn.execute(
            "UPDATE notes SET content = ?1, note_type = ?2, tags_json = ?3, updated_at = ?4 WHERE id = ?5",
            params![
                note.content,
                note.note_type.as_str(),
                serde_json::to_string(&note.tags)?,
                Utc::now().to_rfc3339(),
                id
            ],
        )?;
        Ok(changed > 0)
    }

    /// Returns the new pinned state, or `false` when the note does not exist.
    pub fn toggle_pin_note(&self, id: i64) -> AppResult<bool> {
        let conn = self.lock()?;
        let Some(note) = select_note(&conn, id)? else {
            return Ok(false);
        };
        let pinned = !note.pinned;
        conn.execute(
            "UPDATE notes SET pinned = ?1, updated_at = ?2 WHERE id = ?3",
            params![pinned, Utc::now().to_rfc3339(), id],
        )?;
        Ok(pinned)
    }

    /// Archiving also unpins.
    pub fn archive_note(&self, id: i64) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE notes SET archived = 1, pinned = 0, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(changed > 0)
    }

    pub fn unarchive_note(&self, id: i64) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE notes SET archived = 0, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_note(&self, id: i64) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM notes WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Active notes for a day: pinned first, then newest first.
    pub fn notes_for_date(&self, date: NaiveDate) -> AppResult<Vec<Note>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes WHERE date = ?1 AND archived = 0
             ORDER BY pinned DESC, created_at DESC, id DESC",
            NOTE_COLUMNS
        ))?;
        let rows = stmt.query_map([date], parse_note_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn all_notes_for_date(&self, date: NaiveDate) -> AppResult<Vec<Note>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes WHERE date = ?1 ORDER BY created_at DESC, id DESC",
            NOTE_COLUMNS
        ))?;
        let rows = stmt.query_map([date], parse_note_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn notes_summary(&self, date: NaiveDate) -> AppResult<NotesSummary> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT note_type, COUNT(1) FROM notes WHERE date = ?1 AND archived = 0 GROUP BY note_type",
        )?;
        let mut rows = stmt.query([date])?;
        let mut types: BTreeMap<NoteType, usize> = NoteType::ALL.into_iter().map(|kind| (kind, 0)).collect();
        let mut count = 0usize;
        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            let n: i64 = row.get(1)?;
            match NoteType::parse(&raw) {
                Ok(kind) => {
                    types.insert(kind, n as usize);
                    count += n as usize;
                }
                Err(error) => {
                    tracing::warn!(note_type = %raw, error = %error, "skipping notes with unknown type");
                }
            }
        }
        Ok(NotesSummary { count, types })
    }

    // ─── Journal ────────────────────────────────────────────────────────────

    pub fn journal_entry(&self, date: NaiveDate) -> AppResult<Option<JournalEntry>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM journal_entries WHERE date = ?1", JOURNAL_COLUMNS),
            [date],
            parse_journal_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Creates or replaces the single entry for `date`. Returns its id.
    pub fn save_journal_entry(&self, date: NaiveDate, content: &str, prompt: Option<&str>) -> AppResult<i64> {
        let word_count = count_words(content);
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO journal_entries (date, content, prompt, word_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(date) DO UPDATE SET
               content = excluded.content,
               prompt = excluded.prompt,
               word_count = excluded.word_count,
               updated_at = excluded.updated_at",
            params![date, content, prompt, word_count, now],
        )?;
        let id: i64 = conn.query_row("SELECT id FROM journal_entries WHERE date = ?1", [date], |row| row.get(0))?;
        Ok(id)
    }

    pub fn delete_journal_entry(&self, id: i64) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM journal_entries WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    pub fn recent_journal_entries(&self, limit: usize) -> AppResult<Vec<JournalEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM journal_entries ORDER BY date DESC LIMIT ?1",
            JOURNAL_COLUMNS
        ))?;
        let rows = stmt.query_map([limit as i64], parse_journal_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn journal_summary(&self, date: NaiveDate) -> AppResult<JournalSummary> {
        let entry = self.journal_entry(date)?;
        Ok(JournalSummary {
            has_entry: entry.as_ref().is_some_and(|entry| !entry.content.trim().is_empty()),
            word_count: entry.map(|entry| entry.word_count).unwrap_or(0),
        })
    }

    // ─── Pomodoro ───────────────────────────────────────────────────────────

    pub fn add_session(&self, date: NaiveDate, session_type: SessionType, duration_secs: u32) -> AppResult<PomodoroSession> {
        let now = Utc::now();
        let stamp = now.to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO pomodoro_sessions (date, session_type, duration_secs, completed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4, ?4)",
            params![date, session_type.as_str(), duration_secs, stamp],
        )?;
        Ok(PomodoroSession {
            id: conn.last_insert_rowid(),
            date,
            session_type,
            duration_secs,
            completed_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn sessions_for_date(&self, date: NaiveDate) -> AppResult<Vec<PomodoroSession>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM pomodoro_sessions WHERE date = ?1 ORDER BY completed_at ASC, id ASC",
            SESSION_COLUMNS
        ))?;
        let rows = stmt.query_map([date], parse_session_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Counts work sessions only.
    pub fn pomodoro_summary(&self, date: NaiveDate) -> AppResult<PomodoroSummary> {
        let conn = self.lock()?;
        let (count, seconds): (i64, i64) = conn.query_row(
            "SELECT COUNT(1), COALESCE(SUM(duration_secs), 0) FROM pomodoro_sessions
             WHERE date = ?1 AND session_type = 'work'",
            [date],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(PomodoroSummary {
            count: count as usize,
            total_minutes: (seconds as f64 / 60.0).round() as u32,
        })
    }

    // ─── Day canvas ─────────────────────────────────────────────────────────

    pub fn canvas_for_date(&self, date: NaiveDate) -> AppResult<Option<DayCanvas>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, date, canvas_data, created_at, updated_at FROM day_canvases WHERE date = ?1",
            [date],
            |row| {
                Ok(DayCanvas {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    canvas_data: row.get(2)?,
                    created_at: parse_time(&row.get::<_, String>(3)?)?,
                    updated_at: parse_time(&row.get::<_, String>(4)?)?,
                })
            },
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn save_canvas(&self, date: NaiveDate, strokes: &[CanvasStroke]) -> AppResult<()> {
        let canvas_data = serde_json::to_string(strokes)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO day_canvases (date, canvas_data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(date) DO UPDATE SET canvas_data = excluded.canvas_data, updated_at = excluded.updated_at",
            params![date, canvas_data, now],
        )?;
        Ok(())
    }

    /// Strokes drawn on a day. A corrupt payload reads as an empty canvas.
    pub fn strokes_for_date(&self, date: NaiveDate) -> AppResult<Vec<CanvasStroke>> {
        let Some(canvas) = self.canvas_for_date(date)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<CanvasStroke>>(&canvas.canvas_data) {
            Ok(strokes) => Ok(strokes),
            Err(error) => {
                tracing::warn!(date = %date, error = %error, "discarding malformed canvas payload");
                Ok(Vec::new())
            }
        }
    }

    pub fn clear_canvas(&self, date: NaiveDate) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM day_canvases WHERE date = ?1", [date])?;
        Ok(changed > 0)
    }

    // ─── Client settings ────────────────────────────────────────────────────

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        Ok(self.read_setting::<AppSettings>(SETTINGS_KEY)?.unwrap_or_default())
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: AppSettings =
            serde_json::from_value(merged).map_err(|error| AppError::Validation(error.to_string()))?;
        self.write_setting(SETTINGS_KEY, &settings)?;
        Ok(settings)
    }

    pub fn get_layout_state(&self) -> AppResult<Option<LayoutState>> {
        self.read_setting(LAYOUT_KEY)
    }

    pub fn save_layout_state(&self, state: &LayoutState) -> AppResult<()> {
        self.write_setting(LAYOUT_KEY, state)
    }

    fn read_setting<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row("SELECT value_json FROM settings WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;

        Ok(raw.and_then(|raw| match serde_json::from_str::<T>(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key, error = %error, "ignoring malformed persisted setting");
                None
            }
        }))
    }

    fn write_setting<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![key, serde_json::to_string(value)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM settings WHERE key = ?1",
            [SETTINGS_KEY],
            |row| row.get(0),
        )?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
                params![
                    SETTINGS_KEY,
                    serde_json::to_string(&AppSettings::default())?,
                    Utc::now().to_rfc3339()
                ],
            )?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn raw_execute(&self, sql: &str) -> AppResult<usize> {
        let conn = self.lock()?;
        Ok(conn.execute(sql, [])?)
    }

    #[cfg(test)]
    fn orphaned_completion_count(&self) -> AppResult<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            "SELECT COUNT(1) FROM habit_completions c
             WHERE NOT EXISTS (SELECT 1 FROM habits h WHERE h.id = c.habit_id)",
            [],
            |row| row.get(0),
        )?)
    }
}

fn ensure_habit_exists(conn: &Connection, habit_id: i64) -> AppResult<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM habits WHERE id = ?1)",
        [habit_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("habit {}", habit_id)))
    }
}

fn select_completion(conn: &Connection, habit_id: i64, date: NaiveDate) -> AppResult<Option<HabitCompletion>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM habit_completions WHERE habit_id = ?1 AND date = ?2",
            COMPLETION_COLUMNS
        ),
        params![habit_id, date],
        parse_completion_row,
    )
    .optional()
    .map_err(AppError::from)
}

fn select_mood(conn: &Connection, id: i64) -> AppResult<Option<MoodEntry>> {
    conn.query_row(
        &format!("SELECT {} FROM moods WHERE id = ?1", MOOD_COLUMNS),
        [id],
        parse_mood_row,
    )
    .optional()
    .map_err(AppError::from)
}

fn select_note(conn: &Connection, id: i64) -> AppResult<Option<Note>> {
    conn.query_row(
        &format!("SELECT {} FROM notes WHERE id = ?1", NOTE_COLUMNS),
        [id],
        parse_note_row,
    )
    .optional()
    .map_err(AppError::from)
}

fn parse_habit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Habit> {
    Ok(Habit {
        id: row.get(0)?,
        name: row.get(1)?,
        archived: row.get(2)?,
        created_at: parse_time(&row.get::<_, String>(3)?)?,
        updated_at: parse_time(&row.get::<_, String>(4)?)?,
    })
}

fn parse_completion_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HabitCompletion> {
    let raw_status: String = row.get(3)?;
    let status = CompletionStatus::parse(&raw_status).map_err(|error| conversion_error(3, error))?;
    Ok(HabitCompletion {
        id: row.get(0)?,
        habit_id: row.get(1)?,
        date: row.get(2)?,
        status,
        created_at: parse_time(&row.get::<_, String>(4)?)?,
        updated_at: parse_time(&row.get::<_, String>(5)?)?,
    })
}

fn parse_mood_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MoodEntry> {
    let mood = MoodLevel::new(row.get(2)?).map_err(|error| conversion_error(2, error))?;
    let energy = match row.get::<_, Option<u8>>(3)? {
        Some(value) => Some(EnergyLevel::new(value).map_err(|error| conversion_error(3, error))?),
        None => None,
    };
    Ok(MoodEntry {
        id: row.get(0)?,
        date: row.get(1)?,
        mood,
        energy,
        tags: decode_json_list(&row.get::<_, String>(4)?, "mood tags"),
        note: row.get(5)?,
        created_at: parse_time(&row.get::<_, String>(6)?)?,
        updated_at: parse_time(&row.get::<_, String>(7)?)?,
    })
}

fn parse_note_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    let note_type = NoteType::parse(&row.get::<_, String>(3)?).unwrap_or(NoteType::Thought);
    Ok(Note {
        id: row.get(0)?,
        date: row.get(1)?,
        content: row.get(2)?,
        note_type,
        tags: decode_json_list(&row.get::<_, String>(4)?, "note tags"),
        pinned: row.get(5)?,
        archived: row.get(6)?,
        created_at: parse_time(&row.get::<_, String>(7)?)?,
        updated_at: parse_time(&row.get::<_, String>(8)?)?,
    })
}

fn parse_journal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalEntry> {
    Ok(JournalEntry {
        id: row.get(0)?,
        date: row.get(1)?,
        content: row.get(2)?,
        prompt: row.get(3)?,
        word_count: row.get(4)?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
        updated_at: parse_time(&row.get::<_, String>(6)?)?,
    })
}

fn parse_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PomodoroSession> {
    let session_type = SessionType::parse(&row.get::<_, String>(2)?).map_err(|error| conversion_error(2, error))?;
    Ok(PomodoroSession {
        id: row.get(0)?,
        date: row.get(1)?,
        session_type,
        duration_secs: row.get(3)?,
        completed_at: parse_time(&row.get::<_, String>(4)?)?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
        updated_at: parse_time(&row.get::<_, String>(6)?)?,
    })
}

fn decode_json_list<T: DeserializeOwned>(raw: &str, what: &str) -> Vec<T> {
    serde_json::from_str(raw).unwrap_or_else(|error| {
        tracing::warn!(field = what, error = %error, "falling back to empty list for malformed payload");
        Vec::new()
    })
}

fn conversion_error(column: usize, error: AppError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
    )
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

fn validate_text(field: &str, value: &str, max_chars: usize) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "{} must be {} characters or less",
            field, max_chars
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_optional_text(field: &str, value: Option<&str>, max_chars: usize) -> AppResult<Option<String>> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => validate_text(field, value, max_chars).map(Some),
        None => Ok(None),
    }
}

pub fn count_words(content: &str) -> u32 {
    content.split_whitespace().count() as u32
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
