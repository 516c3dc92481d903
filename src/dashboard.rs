use crate::autosave::AutoSaver;
use crate::calendar;
use crate::config::AppConfig;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::layout::LayoutStore;
use crate::models::{
    AppSettings, DashboardView, DayCell, DayView, HabitWithStatus, MoodTrendPoint, Summary, Theme, WidgetPanel,
};
use crate::widgets::habits::HabitsWidget;
use crate::widgets::journal::JournalWidget;
use crate::widgets::mood::MoodWidget;
use crate::widgets::notes::NotesWidget;
use crate::widgets::pomodoro::PomodoroWidget;
use crate::widgets::{manifest_with_settings, WidgetDescriptor, WidgetRegistry};
use chrono::{Local, NaiveDate};
use futures_util::future::join_all;
use serde_json::json;
use std::sync::Arc;

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Composition root: owns the database, the widget registry and the layout
/// store, and exposes the operations the presentation layer calls.
pub struct DashboardCore {
    db: Arc<Database>,
    registry: WidgetRegistry,
    layout: LayoutStore,
    config: AppConfig,
}

impl DashboardCore {
    /// Opens (or creates) the database under the configured data directory.
    pub fn open(config: AppConfig) -> AppResult<Self> {
        let data_dir = config.resolved_data_dir()?;
        std::fs::create_dir_all(&data_dir)?;
        let db = Arc::new(Database::new(&config.database_path()?)?);
        Self::new(db, config)
    }

    pub fn new(db: Arc<Database>, config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let registry = WidgetRegistry::new();
        registry.initialize(manifest_with_settings(db.clone(), config.pomodoro_settings()))?;
        let layout = LayoutStore::new(db.clone(), registry.list_configs());
        Ok(Self {
            db,
            registry,
            layout,
            config,
        })
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    pub fn layout(&self) -> &LayoutStore {
        &self.layout
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn get_all_widget_summaries(&self, date: NaiveDate) -> Vec<Summary> {
        self.registry.collect_summaries(date).await
    }

    /// Panels for every enabled widget. A widget that fails to render shows
    /// a "no data" panel instead of failing the dashboard.
    pub async fn dashboard(&self, date: NaiveDate) -> AppResult<DashboardView> {
        let visible = self.layout.visible_widgets(&self.registry)?;
        let panels = join_all(visible.iter().map(|descriptor| render_or_placeholder(descriptor, date))).await;
        Ok(DashboardView { date, panels })
    }

    pub async fn day_view(&self, date: NaiveDate) -> AppResult<DayView> {
        let summaries = calendar::day_summary(&self.registry, date).await;
        let strokes = self.db.strokes_for_date(date)?;
        Ok(DayView {
            date,
            summaries,
            strokes,
        })
    }

    pub async fn calendar(&self, today: NaiveDate) -> AppResult<Vec<DayCell>> {
        calendar::calendar_strip(
            &self.registry,
            today,
            self.config.calendar.days_to_show,
            self.config.calendar.future_days,
        )
        .await
    }

    // ─── Settings ───────────────────────────────────────────────────────────

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        self.db.get_settings()
    }

    pub fn update_settings(&self, patch: serde_json::Value) -> AppResult<AppSettings> {
        if !patch.is_object() {
            return Err(AppError::Validation("settings update must be a JSON object".to_string()));
        }
        let settings = self.db.update_settings(patch)?;
        tracing::info!(theme = ?settings.theme, bottom_bar_collapsed = settings.bottom_bar_collapsed, "settings updated");
        Ok(settings)
    }

    pub fn set_theme(&self, theme: Theme) -> AppResult<AppSettings> {
        self.update_settings(json!({ "theme": theme }))
    }

    pub fn toggle_bottom_bar(&self) -> AppResult<AppSettings> {
        let collapsed = self.db.get_settings()?.bottom_bar_collapsed;
        self.update_settings(json!({ "bottomBarCollapsed": !collapsed }))
    }

    // ─── Widget helpers ─────────────────────────────────────────────────────

    pub fn habits_with_status(&self, date: NaiveDate) -> AppResult<Vec<HabitWithStatus>> {
        HabitsWidget::new(self.db.clone()).habits_with_status(date, today())
    }

    pub fn habit_streak(&self, habit_id: i64, today: NaiveDate) -> AppResult<u32> {
        if self.db.get_habit(habit_id)?.is_none() {
            return Err(AppError::NotFound(format!("habit {}", habit_id)));
        }
        HabitsWidget::new(self.db.clone()).streak(habit_id, today)
    }

    pub fn mood_trend(&self, today: NaiveDate, days: u32) -> AppResult<Vec<MoodTrendPoint>> {
        MoodWidget::new(self.db.clone()).trend(today, days)
    }

    pub fn note_editor(&self, note_id: i64) -> AppResult<AutoSaver> {
        NotesWidget::new(self.db.clone()).editor(note_id, self.config.autosave_debounce())
    }

    pub fn journal_editor(&self, date: NaiveDate, prompt: Option<&str>) -> AppResult<AutoSaver> {
        JournalWidget::new(self.db.clone()).editor(date, prompt, self.config.autosave_debounce())
    }

    pub fn pomodoro(&self) -> PomodoroWidget {
        PomodoroWidget::with_settings(self.db.clone(), self.config.pomodoro_settings())
    }
}

async fn render_or_placeholder(descriptor: &WidgetDescriptor, date: NaiveDate) -> WidgetPanel {
    match descriptor.render(date).await {
        Ok(panel) => panel,
        Err(error) => {
            tracing::warn!(widget_id = %descriptor.id(), %date, error = %error, "widget failed to render");
            WidgetPanel {
                widget_id: descriptor.id().to_string(),
                title: descriptor.config.name.clone(),
                lines: vec!["no data".to_string()],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DashboardCore;
    use crate::config::AppConfig;
    use crate::db::Database;
    use crate::models::{CanvasPoint, CanvasStroke, Theme};
    use crate::widgets::RegistryState;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;

    fn core() -> (tempfile::TempDir, DashboardCore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Database::new(&dir.path().join("test.db")).expect("db"));
        let core = DashboardCore::new(db, AppConfig::default()).expect("core");
        (dir, core)
    }

    #[tokio::test]
    async fn dashboard_renders_enabled_widgets_in_order() {
        let (_dir, core) = core();
        assert_eq!(core.registry().state(), RegistryState::Ready);
        let date = NaiveDate::from_ymd_opt(2024, 10, 1).expect("date");

        let view = core.dashboard(date).await.expect("dashboard");
        let ids: Vec<&str> = view.panels.iter().map(|panel| panel.widget_id.as_str()).collect();
        assert_eq!(ids, vec!["habits", "mood", "notes", "pomodoro"]);

        core.layout().toggle_widget("journal").expect("toggle");
        let view = core.dashboard(date).await.expect("dashboard");
        assert_eq!(view.panels.len(), 5);
    }

    #[tokio::test]
    async fn open_creates_the_data_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            data_dir: Some(dir.path().join("nested").join("data")),
            ..AppConfig::default()
        };
        let core = DashboardCore::open(config).expect("open");
        assert!(core.db().path().exists());
        assert!(core.get_all_widget_summaries(NaiveDate::from_ymd_opt(2024, 1, 1).expect("date")).await.is_empty());
    }

    #[tokio::test]
    async fn day_view_includes_canvas_strokes() {
        let (_dir, core) = core();
        let date = NaiveDate::from_ymd_opt(2024, 10, 2).expect("date");
        let stroke = CanvasStroke {
            points: vec![CanvasPoint { x: 1.0, y: 2.0 }],
            color: "#000000".to_string(),
            width: 2.0,
        };
        core.db().save_canvas(date, &[stroke.clone()]).expect("save");
        let view = core.day_view(date).await.expect("day view");
        assert_eq!(view.strokes, vec![stroke]);
        assert!(view.summaries.is_empty());
    }

    #[test]
    fn settings_operations_persist() {
        let (_dir, core) = core();
        assert_eq!(core.get_settings().expect("settings").theme, Theme::System);
        assert_eq!(core.set_theme(Theme::Dark).expect("theme").theme, Theme::Dark);
        assert!(core.toggle_bottom_bar().expect("toggle").bottom_bar_collapsed);
        assert!(!core.toggle_bottom_bar().expect("toggle").bottom_bar_collapsed);
        assert!(core.update_settings(json!(["dark"])).is_err());
        assert!(core.update_settings(json!({ "theme": "neon" })).is_err());
        assert_eq!(core.get_settings().expect("settings").theme, Theme::Dark);
    }

    #[tokio::test]
    async fn calendar_with_no_past_days_shows_only_upcoming_days() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Database::new(&dir.path().join("test.db")).expect("db"));
        let config = AppConfig::parse("calendar:\n  days_to_show: 0\n  future_days: 2\n").expect("config");
        let core = DashboardCore::new(db, config).expect("core");
        let today = NaiveDate::from_ymd_opt(2024, 10, 4).expect("date");

        let cells = core.calendar(today).await.expect("calendar");
        let dates: Vec<NaiveDate> = cells.iter().map(|cell| cell.date).collect();
        assert_eq!(dates, vec![today.succ_opt().expect("date"), today + chrono::Duration::days(2)]);
        assert!(cells.iter().all(|cell| !cell.is_today));
    }

    #[test]
    fn streak_for_unknown_habit_is_not_found() {
        let (_dir, core) = core();
        let today = NaiveDate::from_ymd_opt(2024, 10, 3).expect("date");
        assert!(core.habit_streak(99, today).is_err());
    }
}
