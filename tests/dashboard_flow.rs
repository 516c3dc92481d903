use chrono::{Duration, NaiveDate};
use life_os_lib::config::AppConfig;
use life_os_lib::dashboard::DashboardCore;
use life_os_lib::models::{CompletionStatus, MoodLevel, NoteType, SessionType};
use life_os_lib::widgets::WidgetRegistry;

fn open(dir: &tempfile::TempDir) -> DashboardCore {
    let config = AppConfig::parse(&format!("data_dir: {}\nautosave:\n  debounce_ms: 20\n", dir.path().display()))
        .expect("config");
    DashboardCore::open(config).expect("open")
}

fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
}

#[tokio::test]
async fn a_day_of_activity_shows_up_in_summaries_and_calendar() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = open(&dir);
    let today = day("2024-11-20");
    let db = core.db();

    let reading = db.add_habit("Read").expect("habit");
    db.add_habit("Stretch").expect("habit");
    for offset in 0..3 {
        db.toggle_completion(reading.id, today - Duration::days(offset)).expect("toggle");
    }
    db.log_mood(today, MoodLevel::new(4).expect("mood"), None, &[], None).expect("mood");
    db.add_note(today, "buy oat milk", NoteType::Task, &[]).expect("note");
    db.add_session(today, SessionType::Work, 25 * 60).expect("session");
    db.add_session(today, SessionType::ShortBreak, 5 * 60).expect("break");

    let summaries = core.get_all_widget_summaries(today).await;
    let ids: Vec<&str> = summaries.iter().map(|summary| summary.widget_id.as_str()).collect();
    assert_eq!(ids, vec!["habits", "mood", "notes", "pomodoro"]);
    assert!(summaries.iter().all(|summary| summary.has_data));
    assert_eq!(summaries[0].primary, "1/2 habits");
    assert_eq!(summaries[3].secondary.as_deref(), Some("25 min focused"));

    assert_eq!(core.habit_streak(reading.id, today).expect("streak"), 3);
    db.set_habit_status(reading.id, today, CompletionStatus::Missed).expect("status");
    assert_eq!(core.habit_streak(reading.id, today).expect("streak"), 0);

    let cells = core.calendar(today).await.expect("calendar");
    assert_eq!(cells.len(), 17);
    let current = cells.iter().find(|cell| cell.is_today).expect("today cell");
    assert_eq!(current.colors, vec!["habit", "mood", "notes", "pomodoro"]);
}

#[tokio::test]
async fn journal_edits_are_debounced_into_one_entry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = open(&dir);
    let date = day("2024-11-21");

    let editor = core.journal_editor(date, None).expect("editor");
    editor.edit("a").await;
    editor.edit("a long").await;
    editor.edit("a long day").await;
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    let entry = core.db().journal_entry(date).expect("entry").expect("saved");
    assert_eq!(entry.content, "a long day");
    assert_eq!(entry.word_count, 3);

    let summaries = core.get_all_widget_summaries(date).await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].primary, "📔 3 words");
}

#[tokio::test]
async fn data_survives_reopening_and_deleting_habits_leaves_no_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let date = day("2024-11-22");
    let habit_id = {
        let core = open(&dir);
        let habit = core.db().add_habit("Meditate").expect("habit");
        core.db().toggle_completion(habit.id, date).expect("toggle");
        core.layout().toggle_widget("journal").expect("toggle");
        habit.id
    };

    let core = open(&dir);
    assert!(core.layout().is_widget_enabled("journal").expect("enabled"));
    assert_eq!(core.db().count_completions(habit_id).expect("count"), 1);

    assert!(core.db().delete_habit(habit_id).expect("delete"));
    assert!(core.db().completion_history(habit_id).expect("history").is_empty());
    assert!(core.get_all_widget_summaries(date).await.is_empty());
}

#[tokio::test]
async fn empty_registry_yields_no_summaries() {
    let registry = WidgetRegistry::new();
    assert!(registry.collect_summaries(day("2024-11-23")).await.is_empty());
}
