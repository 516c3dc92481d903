use super::Widget;
use crate::autosave::{AutoSaver, Committer};
use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{Summary, WidgetCategory, WidgetConfig, WidgetPanel, WidgetProps, WidgetSizes};
use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;
use std::sync::Arc;
use tokio::time::Duration;

pub const JOURNAL_WIDGET_ID: &str = "journal";
pub const RECENT_ENTRIES: usize = 7;

pub const JOURNAL_PROMPTS: [&str; 10] = [
    "What are you grateful for today?",
    "What was the highlight of your day?",
    "What did you learn today?",
    "How are you feeling right now?",
    "What challenged you today?",
    "What would make tomorrow great?",
    "What are you proud of?",
    "What could you have done better?",
    "Who made a difference in your day?",
    "What are you looking forward to?",
];

pub fn random_prompt() -> &'static str {
    let index = rand::rng().random_range(0..JOURNAL_PROMPTS.len());
    JOURNAL_PROMPTS[index]
}

pub struct JournalWidget {
    db: Arc<Database>,
}

impl JournalWidget {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Autosaving editor for the entry on `date`, seeded with any stored text.
    /// The stored prompt wins over `prompt` when an entry already exists.
    pub fn editor(&self, date: NaiveDate, prompt: Option<&str>, debounce: Duration) -> AppResult<AutoSaver> {
        let existing = self.db.journal_entry(date)?;
        let prompt = existing
            .as_ref()
            .and_then(|entry| entry.prompt.clone())
            .or_else(|| prompt.map(str::to_string));
        let initial = existing.map(|entry| entry.content).unwrap_or_default();

        let db = self.db.clone();
        let committer: Committer = Arc::new(move |content: String| {
            let db = db.clone();
            let prompt = prompt.clone();
            Box::pin(async move {
                db.save_journal_entry(date, &content, prompt.as_deref())?;
                Ok(())
            })
        });
        Ok(AutoSaver::new(initial, debounce, committer))
    }
}

#[async_trait]
impl Widget for JournalWidget {
    fn config(&self) -> WidgetConfig {
        WidgetConfig {
            id: JOURNAL_WIDGET_ID.to_string(),
            name: "Journal".to_string(),
            description: "Daily journaling for reflection and mindfulness".to_string(),
            icon: "book-open".to_string(),
            category: WidgetCategory::Wellness,
            sizes: WidgetSizes {
                min_w: 2,
                min_h: 3,
                max_w: Some(6),
                max_h: Some(6),
                default_w: 4,
                default_h: 4,
            },
        }
    }

    async fn render(&self, props: &WidgetProps) -> AppResult<WidgetPanel> {
        let mut lines = Vec::new();
        match self.db.journal_entry(props.date)? {
            Some(entry) => {
                if let Some(prompt) = &entry.prompt {
                    lines.push(format!("✎ {}", prompt));
                }
                lines.extend(entry.content.lines().map(str::to_string));
                lines.push(format!("{} words", entry.word_count));
            }
            None => lines.push(format!("✎ {}", random_prompt())),
        }
        Ok(WidgetPanel {
            widget_id: props.id.clone(),
            title: "Journal".to_string(),
            lines,
        })
    }

    async fn summarize(&self, date: NaiveDate) -> AppResult<Summary> {
        let summary = self.db.journal_summary(date)?;
        let (primary, secondary) = if summary.has_entry {
            (format!("📔 {} words", summary.word_count), "Journaled today")
        } else {
            ("📔 No entry".to_string(), "Start writing")
        };
        Ok(Summary {
            widget_id: JOURNAL_WIDGET_ID.to_string(),
            primary,
            secondary: Some(secondary.to_string()),
            color: "journal".to_string(),
            has_data: summary.has_entry,
        })
    }
}
