//! Dashboard widgets and the registry that ties them together.
//!
//! A widget is a self-contained module with its own tables, a renderable
//! panel and a per-date [`Summary`]. The set of widgets is fixed at startup by
//! [`manifest`], which the composition root hands to
//! [`WidgetRegistry::initialize`].

pub mod habits;
pub mod journal;
pub mod mood;
pub mod notes;
pub mod pomodoro;
pub mod registry;

use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{Summary, WidgetConfig, WidgetPanel, WidgetProps};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;

use pomodoro::PomodoroSettings;

pub use registry::{Registration, RegistryState, WidgetRegistry};

/// Capability contract every dashboard widget implements.
///
/// `summarize` must be read-only, must tolerate concurrent calls (for other
/// dates and alongside the widget's own writes) and must only touch rows for
/// the requested date.
#[async_trait]
pub trait Widget: Send + Sync {
    fn config(&self) -> WidgetConfig;

    async fn render(&self, props: &WidgetProps) -> AppResult<WidgetPanel>;

    async fn summarize(&self, date: NaiveDate) -> AppResult<Summary>;
}

/// The registry's record for one widget.
#[derive(Clone)]
pub struct WidgetDescriptor {
    pub config: WidgetConfig,
    pub component: Arc<dyn Widget>,
}

impl WidgetDescriptor {
    pub fn new(component: Arc<dyn Widget>) -> Self {
        Self {
            config: component.config(),
            component,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub async fn summarize(&self, date: NaiveDate) -> AppResult<Summary> {
        self.component.summarize(date).await
    }

    pub async fn render(&self, date: NaiveDate) -> AppResult<WidgetPanel> {
        let props = WidgetProps {
            id: self.config.id.clone(),
            date,
        };
        self.component.render(&props).await
    }
}

impl fmt::Debug for WidgetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetDescriptor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Every built-in widget, in default grid order.
pub fn manifest(db: Arc<Database>) -> Vec<WidgetDescriptor> {
    manifest_with_settings(db, PomodoroSettings::default())
}

pub fn manifest_with_settings(db: Arc<Database>, timer: PomodoroSettings) -> Vec<WidgetDescriptor> {
    vec![
        WidgetDescriptor::new(Arc::new(habits::HabitsWidget::new(db.clone()))),
        WidgetDescriptor::new(Arc::new(mood::MoodWidget::new(db.clone()))),
        WidgetDescriptor::new(Arc::new(notes::NotesWidget::new(db.clone()))),
        WidgetDescriptor::new(Arc::new(pomodoro::PomodoroWidget::with_settings(db.clone(), timer))),
        WidgetDescriptor::new(Arc::new(journal::JournalWidget::new(db))),
    ]
}

pub(crate) fn plural(count: usize, singular: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}s", count, singular)
    }
}

#[cfg(test)]
mod tests {
    use super::{manifest, plural};
    use crate::db::Database;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn manifest_configs_are_valid_and_unique() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Database::new(&dir.path().join("test.db")).expect("db"));
        let descriptors = manifest(db);
        let ids: Vec<&str> = descriptors.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["habits", "mood", "notes", "pomodoro", "journal"]);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
        for descriptor in &descriptors {
            descriptor.config.sizes.validate().expect("valid sizes");
        }
    }

    #[test]
    fn pluralises_counts() {
        assert_eq!(plural(1, "note"), "1 note");
        assert_eq!(plural(0, "note"), "0 notes");
        assert_eq!(plural(3, "pomodoro"), "3 pomodoros");
    }
}
