use crate::calendar::MAX_WINDOW_DAYS;
use crate::dashboard::{today, DashboardCore};
use crate::errors::{AppError, AppResult};
use crate::models::{
    CompletionStatus, EnergyLevel, MoodLevel, MoodTag, MoodUpdate, NoteType, NoteUpdate, SessionType, Summary, Theme,
};
use crate::widgets::journal::{random_prompt, RECENT_ENTRIES};
use crate::widgets::pomodoro::format_clock;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "life-os", version, about = "Local-first life dashboard")]
pub struct Cli {
    /// Directory holding the database and logs (overrides config and $LIFE_OS_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    /// YAML config file (overrides $LIFE_OS_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Today's dashboard (default)
    Dashboard,
    /// Summaries and canvas for one day
    Day {
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
    },
    /// Show or change client settings
    Settings {
        #[command(subcommand)]
        cmd: Option<SettingsCmd>,
    },
    /// Calendar strip around today
    Calendar {
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
    },
    /// Widget summaries with data for a date
    Summary {
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
    },
    Habit {
        #[command(subcommand)]
        cmd: HabitCmd,
    },
    Mood {
        #[command(subcommand)]
        cmd: MoodCmd,
    },
    Note {
        #[command(subcommand)]
        cmd: NoteCmd,
    },
    Journal {
        #[command(subcommand)]
        cmd: JournalCmd,
    },
    Pomodoro {
        #[command(subcommand)]
        cmd: PomodoroCmd,
    },
    Canvas {
        #[command(subcommand)]
        cmd: CanvasCmd,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DateArg {
    /// Defaults to today
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,
}

impl DateArg {
    fn resolve(&self) -> NaiveDate {
        self.date.unwrap_or_else(today)
    }
}

#[derive(Subcommand, Debug)]
pub enum SettingsCmd {
    Show,
    Theme {
        #[arg(value_parser = Theme::parse)]
        theme: Theme,
    },
    ToggleBottomBar,
    /// Registered widgets and whether they are enabled
    Widgets,
    ToggleWidget {
        id: String,
    },
    /// Grid layout for a breakpoint (lg, md, sm)
    Layout {
        #[arg(default_value = "lg")]
        breakpoint: String,
    },
    ResetLayout,
}

#[derive(Subcommand, Debug)]
pub enum HabitCmd {
    Add {
        name: String,
    },
    List {
        #[command(flatten)]
        date: DateArg,
    },
    /// Marks done, or clears an existing record
    Toggle {
        id: i64,
        #[command(flatten)]
        date: DateArg,
    },
    Status {
        id: i64,
        #[arg(value_parser = CompletionStatus::parse)]
        status: CompletionStatus,
        #[command(flatten)]
        date: DateArg,
    },
    Rename {
        id: i64,
        name: String,
    },
    Archive {
        id: i64,
    },
    Delete {
        id: i64,
    },
    Streak {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum MoodCmd {
    Log {
        /// 1 (awful) to 5 (great)
        #[arg(value_parser = parse_mood)]
        mood: MoodLevel,
        #[arg(long, value_parser = parse_energy)]
        energy: Option<EnergyLevel>,
        #[arg(long = "tag", value_parser = MoodTag::parse)]
        tags: Vec<MoodTag>,
        #[arg(long)]
        note: Option<String>,
        #[command(flatten)]
        date: DateArg,
    },
    List {
        #[command(flatten)]
        date: DateArg,
    },
    Edit {
        id: i64,
        #[arg(long, value_parser = parse_mood)]
        mood: Option<MoodLevel>,
        #[arg(long, value_parser = parse_energy)]
        energy: Option<EnergyLevel>,
        #[arg(long)]
        note: Option<String>,
    },
    Delete {
        id: i64,
    },
    Trend {
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_WINDOW_DAYS)))]
        days: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum NoteCmd {
    Add {
        content: String,
        #[arg(long = "type", value_parser = NoteType::parse, default_value = "thought")]
        note_type: NoteType,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[command(flatten)]
        date: DateArg,
    },
    List {
        /// Include archived notes
        #[arg(long)]
        all: bool,
        #[command(flatten)]
        date: DateArg,
    },
    /// Replace the content through the autosaving editor
    Edit {
        id: i64,
        content: String,
    },
    Retype {
        id: i64,
        #[arg(value_parser = NoteType::parse)]
        note_type: NoteType,
    },
    Pin {
        id: i64,
    },
    Archive {
        id: i64,
    },
    Unarchive {
        id: i64,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum JournalCmd {
    Write {
        content: String,
        #[arg(long)]
        prompt: Option<String>,
        #[command(flatten)]
        date: DateArg,
    },
    Show {
        #[command(flatten)]
        date: DateArg,
    },
    Recent {
        #[arg(long, default_value_t = RECENT_ENTRIES)]
        limit: usize,
    },
    Prompt,
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum PomodoroCmd {
    /// Run a session in the foreground and record it when it finishes
    Start {
        #[arg(long = "type", value_parser = SessionType::parse, default_value = "work")]
        session_type: SessionType,
    },
    /// Record a session that was timed elsewhere
    Log {
        #[arg(value_parser = SessionType::parse)]
        session_type: SessionType,
        duration_secs: u32,
        #[command(flatten)]
        date: DateArg,
    },
    List {
        #[command(flatten)]
        date: DateArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum CanvasCmd {
    Show {
        #[command(flatten)]
        date: DateArg,
    },
    Clear {
        #[command(flatten)]
        date: DateArg,
    },
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|error| format!("expected YYYY-MM-DD: {}", error))
}

fn parse_mood(raw: &str) -> AppResult<MoodLevel> {
    let value: u8 = raw
        .parse()
        .map_err(|_| AppError::Validation(format!("mood must be a number, got '{}'", raw)))?;
    MoodLevel::new(value)
}

fn parse_energy(raw: &str) -> AppResult<EnergyLevel> {
    let value: u8 = raw
        .parse()
        .map_err(|_| AppError::Validation(format!("energy must be a number, got '{}'", raw)))?;
    EnergyLevel::new(value)
}

/// Text lines or pretty JSON, depending on `--json`.
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, lines: impl FnOnce(&T) -> Vec<String>) -> AppResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            for line in lines(value) {
                println!("{}", line);
            }
        }
        Ok(())
    }

    fn done(&self, changed: bool, what: &str) -> AppResult<()> {
        self.emit(&changed, |changed| {
            vec![if *changed {
                format!("{}: ok", what)
            } else {
                format!("{}: nothing to change", what)
            }]
        })
    }
}

fn summary_line(summary: &Summary) -> String {
    match &summary.secondary {
        Some(secondary) => format!("[{}] {} · {}", summary.widget_id, summary.primary, secondary),
        None => format!("[{}] {}", summary.widget_id, summary.primary),
    }
}

pub async fn execute(core: &DashboardCore, command: Command, json: bool) -> AppResult<()> {
    let out = Output { json };
    match command {
        Command::Dashboard => {
            let view = core.dashboard(today()).await?;
            out.emit(&view, |view| {
                let mut lines = vec![format!("Dashboard for {}", view.date.format("%A, %B %-d, %Y"))];
                for panel in &view.panels {
                    lines.push(String::new());
                    lines.push(format!("## {}", panel.title));
                    lines.extend(panel.lines.iter().map(|line| format!("  {}", line)));
                }
                lines
            })
        }
        Command::Day { date } => {
            let view = core.day_view(date).await?;
            out.emit(&view, |view| {
                let mut lines = vec![format!("{}", view.date.format("%A, %B %-d, %Y"))];
                if view.summaries.is_empty() {
                    lines.push("No data for this day".to_string());
                }
                lines.extend(view.summaries.iter().map(summary_line));
                lines.push(format!("Canvas: {} strokes", view.strokes.len()));
                lines
            })
        }
        Command::Settings { cmd } => settings(core, cmd.unwrap_or(SettingsCmd::Show), &out),
        Command::Calendar { today: anchor } => {
            let cells = core.calendar(anchor.unwrap_or_else(today)).await?;
            out.emit(&cells, |cells| {
                cells
                    .iter()
                    .map(|cell| {
                        let marker = if cell.is_today { ">" } else { " " };
                        let dots = if cell.has_data() {
                            cell.colors.join(" ")
                        } else {
                            "·".to_string()
                        };
                        format!("{} {} {}", marker, cell.date.format("%a %d %b"), dots)
                    })
                    .collect()
            })
        }
        Command::Summary { date } => {
            let summaries = core.get_all_widget_summaries(date).await;
            out.emit(&summaries, |summaries| summaries.iter().map(summary_line).collect())
        }
        Command::Habit { cmd } => habit(core, cmd, &out),
        Command::Mood { cmd } => mood(core, cmd, &out),
        Command::Note { cmd } => note(core, cmd, &out).await,
        Command::Journal { cmd } => journal(core, cmd, &out).await,
        Command::Pomodoro { cmd } => pomodoro(core, cmd, &out).await,
        Command::Canvas { cmd } => match cmd {
            CanvasCmd::Show { date } => {
                let strokes = core.db().strokes_for_date(date.resolve())?;
                out.emit(&strokes, |strokes| {
                    strokes
                        .iter()
                        .map(|stroke| format!("{} points, {} @ {}", stroke.points.len(), stroke.color, stroke.width))
                        .collect()
                })
            }
            CanvasCmd::Clear { date } => out.done(core.db().clear_canvas(date.resolve())?, "canvas cleared"),
        },
    }
}

fn settings(core: &DashboardCore, cmd: SettingsCmd, out: &Output) -> AppResult<()> {
    let show = |settings: &crate::models::AppSettings| {
        vec![
            format!("theme: {:?}", settings.theme).to_lowercase(),
            format!("bottom bar collapsed: {}", settings.bottom_bar_collapsed),
        ]
    };
    match cmd {
        SettingsCmd::Show => out.emit(&core.get_settings()?, show),
        SettingsCmd::Theme { theme } => out.emit(&core.set_theme(theme)?, show),
        SettingsCmd::ToggleBottomBar => out.emit(&core.toggle_bottom_bar()?, show),
        SettingsCmd::Widgets => {
            let enabled = core.layout().enabled_widgets()?;
            let rows: Vec<(String, String, bool)> = core
                .registry()
                .list_configs()
                .into_iter()
                .map(|config| {
                    let on = enabled.contains(&config.id);
                    (config.id, config.name, on)
                })
                .collect();
            out.emit(&rows, |rows| {
                rows.iter()
                    .map(|(id, name, on)| format!("[{}] {} ({})", if *on { "x" } else { " " }, name, id))
                    .collect()
            })
        }
        SettingsCmd::ToggleWidget { id } => {
            if !core.registry().is_registered(&id) {
                return Err(AppError::NotFound(format!("widget '{}'", id)));
            }
            let enabled = core.layout().toggle_widget(&id)?;
            out.emit(&enabled, |enabled| {
                vec![format!("{} {}", id, if *enabled { "enabled" } else { "disabled" })]
            })
        }
        SettingsCmd::Layout { breakpoint } => {
            let items = core.layout().layout_for(&breakpoint)?;
            out.emit(&items, |items| {
                items
                    .iter()
                    .map(|item| format!("{:<10} x={} y={} w={} h={}", item.i, item.x, item.y, item.w, item.h))
                    .collect()
            })
        }
        SettingsCmd::ResetLayout => {
            let state = core.layout().reset_layouts()?;
            out.emit(&state, |state| vec![format!("layout reset; enabled: {}", state.enabled_widgets.join(", "))])
        }
    }
}

fn habit(core: &DashboardCore, cmd: HabitCmd, out: &Output) -> AppResult<()> {
    let db = core.db();
    match cmd {
        HabitCmd::Add { name } => {
            let habit = db.add_habit(&name)?;
            out.emit(&habit, |habit| vec![format!("added habit #{} {}", habit.id, habit.name)])
        }
        HabitCmd::List { date } => {
            let rows = core.habits_with_status(date.resolve())?;
            out.emit(&rows, |rows| {
                rows.iter()
                    .map(|row| {
                        let status = row
                            .completion
                            .as_ref()
                            .map(|completion| completion.status.as_str())
                            .unwrap_or("-");
                        format!("#{} {} [{}] streak {}", row.habit.id, row.habit.name, status, row.streak)
                    })
                    .collect()
            })
        }
        HabitCmd::Toggle { id, date } => {
            let status = db.toggle_completion(id, date.resolve())?;
            out.emit(&status, |status| {
                vec![match status {
                    Some(status) => format!("habit #{} marked {}", id, status.as_str()),
                    None => format!("habit #{} cleared", id),
                }]
            })
        }
        HabitCmd::Status { id, status, date } => {
            db.set_habit_status(id, date.resolve(), status)?;
            out.done(true, &format!("habit #{} {}", id, status.as_str()))
        }
        HabitCmd::Rename { id, name } => out.done(db.rename_habit(id, &name)?, "rename"),
        HabitCmd::Archive { id } => out.done(db.archive_habit(id)?, "archive"),
        HabitCmd::Delete { id } => out.done(db.delete_habit(id)?, "delete"),
        HabitCmd::Streak { id } => {
            let streak = core.habit_streak(id, today())?;
            out.emit(&streak, |streak| vec![format!("habit #{}: {} day streak", id, streak)])
        }
    }
}

fn mood(core: &DashboardCore, cmd: MoodCmd, out: &Output) -> AppResult<()> {
    let db = core.db();
    match cmd {
        MoodCmd::Log {
            mood,
            energy,
            tags,
            note,
            date,
        } => {
            let entry = db.log_mood(date.resolve(), mood, energy, &tags, note.as_deref())?;
            out.emit(&entry, |entry| {
                vec![format!("logged #{} {} {}", entry.id, entry.mood.emoji(), entry.mood.label())]
            })
        }
        MoodCmd::List { date } => {
            let entries = db.moods_for_date(date.resolve())?;
            out.emit(&entries, |entries| {
                entries
                    .iter()
                    .map(|entry| {
                        let energy = entry
                            .energy
                            .map(|energy| format!(" energy {}/10", energy.value()))
                            .unwrap_or_default();
                        format!("#{} {} {}{}", entry.id, entry.mood.emoji(), entry.mood.label(), energy)
                    })
                    .collect()
            })
        }
        MoodCmd::Edit {
            id,
            mood,
            energy,
            note,
        } => {
            let update = MoodUpdate {
                mood,
                energy,
                tags: None,
                note,
            };
            out.done(db.update_mood_entry(id, update)?, "mood update")
        }
        MoodCmd::Delete { id } => out.done(db.delete_mood_entry(id)?, "delete"),
        MoodCmd::Trend { days } => {
            let points = core.mood_trend(today(), days)?;
            out.emit(&points, |points| {
                points
                    .iter()
                    .map(|point| {
                        let mood = point.mood.map(|m| format!("{:.1}", m)).unwrap_or_else(|| "-".to_string());
                        let energy = point.energy.map(|e| format!("{:.1}", e)).unwrap_or_else(|| "-".to_string());
                        format!("{} {} mood {} energy {}", point.day_label, point.date, mood, energy)
                    })
                    .collect()
            })
        }
    }
}

async fn note(core: &DashboardCore, cmd: NoteCmd, out: &Output) -> AppResult<()> {
    let db = core.db();
    match cmd {
        NoteCmd::Add {
            content,
            note_type,
            tags,
            date,
        } => {
            let note = db.add_note(date.resolve(), &content, note_type, &tags)?;
            out.emit(&note, |note| vec![format!("added {} note #{}", note.note_type.label(), note.id)])
        }
        NoteCmd::List { all, date } => {
            let date = date.resolve();
            let notes = if all {
                db.all_notes_for_date(date)?
            } else {
                db.notes_for_date(date)?
            };
            out.emit(&notes, |notes| {
                notes
                    .iter()
                    .map(|note| {
                        let flags = match (note.pinned, note.archived) {
                            (_, true) => " (archived)",
                            (true, false) => " (pinned)",
                            _ => "",
                        };
                        format!("#{} {} {}{}", note.id, note.note_type.emoji(), note.content, flags)
                    })
                    .collect()
            })
        }
        NoteCmd::Edit { id, content } => {
            let editor = core.note_editor(id)?;
            editor.edit(content).await;
            editor.flush_now().await?;
            out.done(true, "note saved")
        }
        NoteCmd::Retype { id, note_type } => {
            let update = NoteUpdate {
                note_type: Some(note_type),
                ..NoteUpdate::default()
            };
            out.done(db.update_note(id, update)?, "retype")
        }
        NoteCmd::Pin { id } => {
            let pinned = db.toggle_pin_note(id)?;
            out.emit(&pinned, |pinned| {
                vec![format!("note #{} {}", id, if *pinned { "pinned" } else { "unpinned" })]
            })
        }
        NoteCmd::Archive { id } => out.done(db.archive_note(id)?, "archive"),
        NoteCmd::Unarchive { id } => out.done(db.unarchive_note(id)?, "unarchive"),
        NoteCmd::Delete { id } => out.done(db.delete_note(id)?, "delete"),
    }
}

async fn journal(core: &DashboardCore, cmd: JournalCmd, out: &Output) -> AppResult<()> {
    let db = core.db();
    match cmd {
        JournalCmd::Write { content, prompt, date } => {
            let date = date.resolve();
            let editor = core.journal_editor(date, prompt.as_deref())?;
            editor.edit(content).await;
            editor.flush_now().await?;
            let entry = db.journal_entry(date)?;
            out.emit(&entry, |entry| {
                vec![match entry {
                    Some(entry) => format!("saved {} words for {}", entry.word_count, entry.date),
                    None => "nothing saved".to_string(),
                }]
            })
        }
        JournalCmd::Show { date } => {
            let entry = db.journal_entry(date.resolve())?;
            out.emit(&entry, |entry| match entry {
                Some(entry) => {
                    let mut lines = Vec::new();
                    if let Some(prompt) = &entry.prompt {
                        lines.push(format!("> {}", prompt));
                    }
                    lines.extend(entry.content.lines().map(str::to_string));
                    lines.push(format!("({} words)", entry.word_count));
                    lines
                }
                None => vec!["No entry".to_string()],
            })
        }
        JournalCmd::Recent { limit } => {
            let entries = db.recent_journal_entries(limit)?;
            out.emit(&entries, |entries| {
                entries
                    .iter()
                    .map(|entry| format!("#{} {} {} words", entry.id, entry.date, entry.word_count))
                    .collect()
            })
        }
        JournalCmd::Prompt => {
            let prompt = random_prompt();
            out.emit(&prompt, |prompt| vec![prompt.to_string()])
        }
        JournalCmd::Delete { id } => out.done(db.delete_journal_entry(id)?, "delete"),
    }
}

async fn pomodoro(core: &DashboardCore, cmd: PomodoroCmd, out: &Output) -> AppResult<()> {
    let widget = core.pomodoro();
    match cmd {
        PomodoroCmd::Start { session_type } => {
            let date = today();
            let mut timer = widget.timer(date)?;
            timer.skip_to(session_type);
            if !out.json {
                println!("{} started: {}", session_type.as_str(), format_clock(timer.total_time()));
            }
            let session = widget.run_session(&mut timer, date, Duration::from_secs(1)).await?;
            out.emit(&session, |session| {
                vec![format!("recorded {} session #{}", session.session_type.as_str(), session.id)]
            })
        }
        PomodoroCmd::Log {
            session_type,
            duration_secs,
            date,
        } => {
            let session = core.db().add_session(date.resolve(), session_type, duration_secs)?;
            out.emit(&session, |session| vec![format!("recorded session #{}", session.id)])
        }
        PomodoroCmd::List { date } => {
            let sessions = core.db().sessions_for_date(date.resolve())?;
            out.emit(&sessions, |sessions| {
                sessions
                    .iter()
                    .map(|session| {
                        format!(
                            "{} {} {}",
                            session.completed_at.format("%H:%M"),
                            session.session_type.as_str(),
                            format_clock(Duration::from_secs(u64::from(session.duration_secs)))
                        )
                    })
                    .collect()
            })
        }
    }
}
