use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─── Widget contract ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetCategory {
    Tracking,
    Productivity,
    Wellness,
    Other,
}

impl WidgetCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tracking => "tracking",
            Self::Productivity => "productivity",
            Self::Wellness => "wellness",
            Self::Other => "other",
        }
    }
}

/// Size constraints in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSizes {
    pub min_w: u32,
    pub min_h: u32,
    pub max_w: Option<u32>,
    pub max_h: Option<u32>,
    pub default_w: u32,
    pub default_h: u32,
}

impl WidgetSizes {
    pub fn validate(&self) -> AppResult<()> {
        check_axis("width", self.min_w, self.max_w, self.default_w)?;
        check_axis("height", self.min_h, self.max_h, self.default_h)
    }
}

fn check_axis(axis: &str, min: u32, max: Option<u32>, default: u32) -> AppResult<()> {
    if min == 0 || default == 0 || max == Some(0) {
        return Err(AppError::Validation(format!(
            "{} sizes must be at least one grid unit",
            axis
        )));
    }
    if let Some(max) = max {
        if min > max {
            return Err(AppError::Validation(format!(
                "minimum {} {} exceeds maximum {}",
                axis, min, max
            )));
        }
        if default > max {
            return Err(AppError::Validation(format!(
                "default {} {} exceeds maximum {}",
                axis, default, max
            )));
        }
    }
    if default < min {
        return Err(AppError::Validation(format!(
            "default {} {} is below minimum {}",
            axis, default, min
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Icon token resolved by the presentation layer (e.g. `list-checks`).
    pub icon: String,
    pub category: WidgetCategory,
    pub sizes: WidgetSizes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetProps {
    pub id: String,
    pub date: NaiveDate,
}

/// Rendered body of a widget for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetPanel {
    pub widget_id: String,
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub widget_id: String,
    pub primary: String,
    pub secondary: Option<String>,
    /// Theme colour token, never a raw colour value.
    pub color: String,
    pub has_data: bool,
}

// ─── Habits ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionStatus {
    Done,
    Skipped,
    Missed,
}

impl CompletionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Missed => "missed",
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "done" => Ok(Self::Done),
            "skipped" => Ok(Self::Skipped),
            "missed" => Ok(Self::Missed),
            other => Err(AppError::Validation(format!("unknown completion status '{}'", other))),
        }
    }

    /// Whether this status keeps a streak alive.
    pub fn counts_toward_streak(self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: i64,
    pub name: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitCompletion {
    pub id: i64,
    pub habit_id: i64,
    pub date: NaiveDate,
    pub status: CompletionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitWithStatus {
    pub habit: Habit,
    pub completion: Option<HabitCompletion>,
    pub streak: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitSummary {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
}

// ─── Mood ───────────────────────────────────────────────────────────────────

/// Mood on a 1-5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MoodLevel(u8);

impl MoodLevel {
    pub fn new(value: u8) -> AppResult<Self> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::Validation(format!("mood must be between 1 and 5, got {}", value)))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn emoji(self) -> &'static str {
        match self.0 {
            1 => "😢",
            2 => "😕",
            3 => "😐",
            4 => "🙂",
            _ => "😄",
        }
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Awful",
            2 => "Bad",
            3 => "Okay",
            4 => "Good",
            _ => "Great",
        }
    }
}

impl TryFrom<u8> for MoodLevel {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MoodLevel> for u8 {
    fn from(value: MoodLevel) -> Self {
        value.0
    }
}

/// Energy on a 1-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct EnergyLevel(u8);

impl EnergyLevel {
    pub fn new(value: u8) -> AppResult<Self> {
        if (1..=10).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::Validation(format!("energy must be between 1 and 10, got {}", value)))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for EnergyLevel {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EnergyLevel> for u8 {
    fn from(value: EnergyLevel) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoodTag {
    Calm,
    Focused,
    Stressed,
    Anxious,
    Happy,
    Tired,
    Energetic,
    Productive,
    Creative,
    Social,
}

impl MoodTag {
    pub const ALL: [MoodTag; 10] = [
        Self::Calm,
        Self::Focused,
        Self::Stressed,
        Self::Anxious,
        Self::Happy,
        Self::Tired,
        Self::Energetic,
        Self::Productive,
        Self::Creative,
        Self::Social,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calm => "Calm",
            Self::Focused => "Focused",
            Self::Stressed => "Stressed",
            Self::Anxious => "Anxious",
            Self::Happy => "Happy",
            Self::Tired => "Tired",
            Self::Energetic => "Energetic",
            Self::Productive => "Productive",
            Self::Creative => "Creative",
            Self::Social => "Social",
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| AppError::Validation(format!("unknown mood tag '{}'", raw)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub mood: MoodLevel,
    pub energy: Option<EnergyLevel>,
    pub tags: Vec<MoodTag>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodUpdate {
    pub mood: Option<MoodLevel>,
    pub energy: Option<EnergyLevel>,
    pub tags: Option<Vec<MoodTag>>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodSummary {
    pub mood: Option<MoodLevel>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodTrendPoint {
    pub date: NaiveDate,
    pub day_label: String,
    pub mood: Option<f64>,
    pub energy: Option<f64>,
}

// ─── Notes ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteType {
    Thought,
    Idea,
    Quote,
    Link,
    Task,
}

impl NoteType {
    pub const ALL: [NoteType; 5] = [Self::Thought, Self::Idea, Self::Quote, Self::Link, Self::Task];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thought => "thought",
            Self::Idea => "idea",
            Self::Quote => "quote",
            Self::Link => "link",
            Self::Task => "task",
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| AppError::Validation(format!("unknown note type '{}'", raw)))
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Thought => "💭",
            Self::Idea => "💡",
            Self::Quote => "💬",
            Self::Link => "🔗",
            Self::Task => "☑️",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Thought => "Thought",
            Self::Idea => "Idea",
            Self::Quote => "Quote",
            Self::Link => "Link",
            Self::Task => "Task",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub date: NaiveDate,
    pub content: String,
    pub note_type: NoteType,
    pub tags: Vec<String>,
    pub pinned: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdate {
    pub content: Option<String>,
    pub note_type: Option<NoteType>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesSummary {
    pub count: usize,
    pub types: BTreeMap<NoteType, usize>,
}

// ─── Journal ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub content: String,
    pub prompt: Option<String>,
    pub word_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSummary {
    pub has_entry: bool,
    pub word_count: u32,
}

// ─── Pomodoro ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionType {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::ShortBreak => "shortBreak",
            Self::LongBreak => "longBreak",
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "work" => Ok(Self::Work),
            "shortBreak" => Ok(Self::ShortBreak),
            "longBreak" => Ok(Self::LongBreak),
            other => Err(AppError::Validation(format!("unknown session type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub id: i64,
    pub date: NaiveDate,
    pub session_type: SessionType,
    pub duration_secs: u32,
    pub completed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSummary {
    pub count: usize,
    pub total_minutes: u32,
}

// ─── Day canvas ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasStroke {
    pub points: Vec<CanvasPoint>,
    pub color: String,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCanvas {
    pub id: i64,
    pub date: NaiveDate,
    pub canvas_data: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Client settings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(AppError::Validation(format!("unknown theme '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub theme: Theme,
    pub bottom_bar_collapsed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutItem {
    /// Widget id this cell holds.
    pub i: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_h: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_h: Option<u32>,
    #[serde(default, rename = "static")]
    pub pinned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutState {
    pub layouts: BTreeMap<String, Vec<LayoutItem>>,
    pub enabled_widgets: Vec<String>,
}

// ─── Calendar ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCell {
    pub date: NaiveDate,
    pub is_today: bool,
    pub summaries: Vec<Summary>,
    pub colors: Vec<String>,
}

impl DayCell {
    pub fn has_data(&self) -> bool {
        !self.summaries.is_empty()
    }
}

// ─── Views ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub date: NaiveDate,
    pub panels: Vec<WidgetPanel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub date: NaiveDate,
    pub summaries: Vec<Summary>,
    pub strokes: Vec<CanvasStroke>,
}
