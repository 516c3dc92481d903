use super::Widget;
use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{
    CompletionStatus, HabitWithStatus, Summary, WidgetCategory, WidgetConfig, WidgetPanel, WidgetProps, WidgetSizes,
};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const HABITS_WIDGET_ID: &str = "habits";

/// Current streak as of `today`.
///
/// `done` and `skipped` keep a streak alive, `missed` or a gap ends it. The
/// streak is anchored at today when today qualifies; a `missed` record for
/// today ends it outright, while a day that simply has not been logged yet
/// falls back to yesterday as the anchor.
pub fn current_streak(history: &BTreeMap<NaiveDate, CompletionStatus>, today: NaiveDate) -> u32 {
    let anchor = match history.get(&today) {
        Some(status) if status.counts_toward_streak() => today,
        Some(_) => return 0,
        None => match today.pred_opt() {
            Some(yesterday) if history.get(&yesterday).is_some_and(|s| s.counts_toward_streak()) => yesterday,
            _ => return 0,
        },
    };

    let mut streak = 0;
    let mut cursor = Some(anchor);
    while let Some(day) = cursor {
        match history.get(&day) {
            Some(status) if status.counts_toward_streak() => {
                streak += 1;
                cursor = day.pred_opt();
            }
            _ => break,
        }
    }
    streak
}

pub struct HabitsWidget {
    db: Arc<Database>,
}

impl HabitsWidget {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn streak(&self, habit_id: i64, today: NaiveDate) -> AppResult<u32> {
        let history = self.db.completion_history(habit_id)?;
        Ok(current_streak(&history, today))
    }

    /// Active habits with their record for `date` and their streak as of `today`.
    pub fn habits_with_status(&self, date: NaiveDate, today: NaiveDate) -> AppResult<Vec<HabitWithStatus>> {
        let mut completions: BTreeMap<i64, _> = self
            .db
            .completions_for_date(date)?
            .into_iter()
            .map(|completion| (completion.habit_id, completion))
            .collect();

        self.db
            .list_habits()?
            .into_iter()
            .map(|habit| {
                let streak = self.streak(habit.id, today)?;
                Ok(HabitWithStatus {
                    completion: completions.remove(&habit.id),
                    habit,
                    streak,
                })
            })
            .collect()
    }
}

fn status_marker(status: Option<CompletionStatus>) -> &'static str {
    match status {
        Some(CompletionStatus::Done) => "[x]",
        Some(CompletionStatus::Skipped) => "[-]",
        Some(CompletionStatus::Missed) => "[!]",
        None => "[ ]",
    }
}

#[async_trait]
impl Widget for HabitsWidget {
    fn config(&self) -> WidgetConfig {
        WidgetConfig {
            id: HABITS_WIDGET_ID.to_string(),
            name: "Habit Tracker".to_string(),
            description: "Track daily habits and streaks".to_string(),
            icon: "list-checks".to_string(),
            category: WidgetCategory::Tracking,
            sizes: WidgetSizes {
                min_w: 2,
                min_h: 2,
                max_w: Some(6),
                max_h: Some(8),
                default_w: 4,
                default_h: 4,
            },
        }
    }

    async fn render(&self, props: &WidgetProps) -> AppResult<WidgetPanel> {
        let today = Local::now().date_naive();
        let habits = self.habits_with_status(props.date, today)?;
        let lines = if habits.is_empty() {
            vec!["No habits yet".to_string()]
        } else {
            habits
                .iter()
                .map(|entry| {
                    let marker = status_marker(entry.completion.as_ref().map(|c| c.status));
                    if entry.streak > 0 {
                        format!("{} #{} {} (🔥 {})", marker, entry.habit.id, entry.habit.name, entry.streak)
                    } else {
                        format!("{} #{} {}", marker, entry.habit.id, entry.habit.name)
                    }
                })
                .collect()
        };
        Ok(WidgetPanel {
            widget_id: props.id.clone(),
            title: "Habit Tracker".to_string(),
            lines,
        })
    }

    async fn summarize(&self, date: NaiveDate) -> AppResult<Summary> {
        let summary = self.db.habit_summary(date)?;
        Ok(Summary {
            widget_id: HABITS_WIDGET_ID.to_string(),
            primary: format!("{}/{} habits", summary.completed, summary.total),
            secondary: Some(format!("{}%", summary.percentage)),
            color: "habit".to_string(),
            has_data: summary.total > 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{current_streak, HabitsWidget};
    use crate::db::Database;
    use crate::models::{CompletionStatus, WidgetProps};
    use crate::widgets::Widget;
    use chrono::{Duration, NaiveDate};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use CompletionStatus::{Done, Missed, Skipped};

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
    }

    fn history(entries: &[(&str, CompletionStatus)]) -> BTreeMap<NaiveDate, CompletionStatus> {
        entries.iter().map(|(raw, status)| (day(raw), *status)).collect()
    }

    #[test]
    fn missed_day_breaks_the_run() {
        let history = history(&[
            ("2024-01-01", Done),
            ("2024-01-02", Done),
            ("2024-01-03", Missed),
            ("2024-01-04", Done),
        ]);
        assert_eq!(current_streak(&history, day("2024-01-04")), 1);
    }

    #[test]
    fn unlogged_today_falls_back_to_yesterday() {
        let today = day("2024-03-10");
        let history = history(&[("2024-03-09", Done), ("2024-03-08", Done)]);
        assert_eq!(current_streak(&history, today), 2);
    }

    #[test]
    fn empty_history_has_no_streak() {
        assert_eq!(current_streak(&BTreeMap::new(), day("2024-03-10")), 0);
    }

    #[test]
    fn missed_today_ends_the_streak_even_if_yesterday_was_done() {
        let history = history(&[("2024-03-10", Missed), ("2024-03-09", Done)]);
        assert_eq!(current_streak(&history, day("2024-03-10")), 0);
    }

    #[test]
    fn skipped_days_keep_the_streak_alive() {
        let history = history(&[
            ("2024-03-07", Done),
            ("2024-03-08", Skipped),
            ("2024-03-09", Done),
            ("2024-03-10", Skipped),
        ]);
        assert_eq!(current_streak(&history, day("2024-03-10")), 4);
    }

    #[test]
    fn gaps_and_stale_history_end_the_walk() {
        let gap = history(&[("2024-03-10", Done), ("2024-03-08", Done)]);
        assert_eq!(current_streak(&gap, day("2024-03-10")), 1);

        let stale = history(&[("2024-03-07", Done), ("2024-03-08", Done)]);
        assert_eq!(current_streak(&stale, day("2024-03-10")), 0);
    }

    #[test]
    fn future_records_are_ignored() {
        let history = history(&[("2024-03-09", Done), ("2024-03-10", Done), ("2024-03-12", Done)]);
        assert_eq!(current_streak(&history, day("2024-03-10")), 2);
    }

    #[tokio::test]
    async fn summary_reflects_active_habits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Database::new(&dir.path().join("test.db")).expect("db"));
        let widget = HabitsWidget::new(db.clone());
        let date = day("2024-04-01");

        let empty = widget.summarize(date).await.expect("summary");
        assert!(!empty.has_data);
        assert_eq!(empty.primary, "0/0 habits");

        let read = db.add_habit("Read").expect("habit");
        db.add_habit("Run").expect("habit");
        db.toggle_completion(read.id, date).expect("toggle");

        let summary = widget.summarize(date).await.expect("summary");
        assert!(summary.has_data);
        assert_eq!(summary.primary, "1/2 habits");
        assert_eq!(summary.secondary.as_deref(), Some("50%"));
        assert_eq!(summary.color, "habit");
    }

    #[tokio::test]
    async fn streak_uses_stored_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Database::new(&dir.path().join("test.db")).expect("db"));
        let widget = HabitsWidget::new(db.clone());
        let habit = db.add_habit("Floss").expect("habit");
        let today = day("2024-04-10");
        for offset in 1..=3 {
            db.toggle_completion(habit.id, today - Duration::days(offset)).expect("toggle");
        }
        assert_eq!(widget.streak(habit.id, today).expect("streak"), 3);

        db.set_habit_status(habit.id, today, Missed).expect("status");
        assert_eq!(widget.streak(habit.id, today).expect("streak"), 0);

        let rows = widget.habits_with_status(today, today).expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].completion.as_ref().map(|c| c.status), Some(Missed));

        let panel = widget
            .render(&WidgetProps {
                id: "habits".to_string(),
                date: today,
            })
            .await
            .expect("render");
        assert!(panel.lines[0].starts_with("[!]"));
        assert!(panel.lines[0].contains("Floss"));
    }
}
