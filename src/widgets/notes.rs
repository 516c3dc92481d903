use super::{plural, Widget};
use crate::autosave::{AutoSaver, Committer};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{NoteUpdate, Summary, WidgetCategory, WidgetConfig, WidgetPanel, WidgetProps, WidgetSizes};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::time::Duration;

pub const NOTES_WIDGET_ID: &str = "notes";

pub struct NotesWidget {
    db: Arc<Database>,
}

impl NotesWidget {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Autosaving editor for the content of an existing note.
    pub fn editor(&self, note_id: i64, debounce: Duration) -> AppResult<AutoSaver> {
        let note = self
            .db
            .get_note(note_id)?
            .ok_or_else(|| AppError::NotFound(format!("note {}", note_id)))?;
        let db = self.db.clone();
        let committer: Committer = Arc::new(move |content: String| {
            let db = db.clone();
            Box::pin(async move {
                let update = NoteUpdate {
                    content: Some(content),
                    ..NoteUpdate::default()
                };
                if db.update_note(note_id, update)? {
                    Ok(())
                } else {
                    Err(AppError::NotFound(format!("note {}", note_id)))
                }
            })
        });
        Ok(AutoSaver::new(note.content, debounce, committer))
    }
}

#[async_trait]
impl Widget for NotesWidget {
    fn config(&self) -> WidgetConfig {
        WidgetConfig {
            id: NOTES_WIDGET_ID.to_string(),
            name: "Quick Notes".to_string(),
            description: "Capture thoughts and ideas instantly".to_string(),
            icon: "sticky-note".to_string(),
            category: WidgetCategory::Productivity,
            sizes: WidgetSizes {
                min_w: 2,
                min_h: 2,
                max_w: Some(8),
                max_h: Some(8),
                default_w: 4,
                default_h: 4,
            },
        }
    }

    async fn render(&self, props: &WidgetProps) -> AppResult<WidgetPanel> {
        let notes = self.db.notes_for_date(props.date)?;
        let lines = if notes.is_empty() {
            vec!["No notes yet".to_string()]
        } else {
            notes
                .iter()
                .map(|note| {
                    let pin = if note.pinned { "📌 " } else { "" };
                    let mut line = format!("{}#{} {} {}", pin, note.id, note.note_type.emoji(), note.content);
                    if !note.tags.is_empty() {
                        let tags: Vec<String> = note.tags.iter().map(|tag| format!("#{}", tag)).collect();
                        line.push_str(&format!(" {}", tags.join(" ")));
                    }
                    line
                })
                .collect()
        };
        Ok(WidgetPanel {
            widget_id: props.id.clone(),
            title: "Quick Notes".to_string(),
            lines,
        })
    }

    async fn summarize(&self, date: NaiveDate) -> AppResult<Summary> {
        let summary = self.db.notes_summary(date)?;
        let breakdown: Vec<String> = summary
            .types
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(kind, count)| format!("{} {}", kind.emoji(), count))
            .collect();
        Ok(Summary {
            widget_id: NOTES_WIDGET_ID.to_string(),
            primary: plural(summary.count, "note"),
            secondary: (!breakdown.is_empty()).then(|| breakdown.join(" ")),
            color: "notes".to_string(),
            has_data: summary.count > 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::NotesWidget;
    use crate::autosave::SaveState;
    use crate::db::Database;
    use crate::models::NoteType;
    use crate::widgets::Widget;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tokio::time::{sleep, Duration};

    fn open() -> (tempfile::TempDir, Arc<Database>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        (dir, Arc::new(db))
    }

    #[tokio::test]
    async fn summary_counts_active_notes() {
        let (_dir, db) = open();
        let widget = NotesWidget::new(db.clone());
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).expect("date");

        assert!(!widget.summarize(date).await.expect("summary").has_data);

        db.add_note(date, "ship it", NoteType::Idea, &[]).expect("note");
        let only = widget.summarize(date).await.expect("summary");
        assert_eq!(only.primary, "1 note");

        let archived = db.add_note(date, "old", NoteType::Thought, &[]).expect("note");
        db.archive_note(archived.id).expect("archive");
        db.add_note(date, "call mum", NoteType::Task, &[]).expect("note");

        let summary = widget.summarize(date).await.expect("summary");
        assert!(summary.has_data);
        assert_eq!(summary.primary, "2 notes");
        assert_eq!(summary.color, "notes");
    }

    #[tokio::test]
    async fn editor_saves_content_after_debounce() {
        let (_dir, db) = open();
        let widget = NotesWidget::new(db.clone());
        let date = NaiveDate::from_ymd_opt(2024, 6, 2).expect("date");
        let note = db.add_note(date, "draft", NoteType::Thought, &[]).expect("note");

        let editor = widget.editor(note.id, Duration::from_millis(30)).expect("editor");
        assert_eq!(editor.content().await, "draft");
        editor.edit("draft, revised").await;
        editor.edit("draft, revised twice").await;
        sleep(Duration::from_millis(150)).await;

        assert_eq!(editor.state().await, SaveState::Clean);
        let stored = db.get_note(note.id).expect("get").expect("note");
        assert_eq!(stored.content, "draft, revised twice");
    }

    #[tokio::test]
    async fn editor_for_missing_note_is_not_found() {
        let (_dir, db) = open();
        let widget = NotesWidget::new(db);
        assert!(widget.editor(404, Duration::from_millis(10)).is_err());
    }
}
