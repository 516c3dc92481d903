use crate::calendar::MAX_WINDOW_DAYS;
use crate::errors::{AppError, AppResult};
use crate::widgets::pomodoro::PomodoroSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "LIFE_OS_CONFIG";
pub const DATA_DIR_ENV: &str = "LIFE_OS_DATA_DIR";
const CONFIG_FILE: &str = "config.yaml";
const DATABASE_FILE: &str = "life-os.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct AppConfig {
    pub data_dir: Option<PathBuf>,
    pub log_level: String,
    pub calendar: CalendarConfig,
    pub pomodoro: PomodoroConfig,
    pub autosave: AutosaveConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: "info".to_string(),
            calendar: CalendarConfig::default(),
            pomodoro: PomodoroConfig::default(),
            autosave: AutosaveConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CalendarConfig {
    pub days_to_show: u32,
    pub future_days: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            days_to_show: 14,
            future_days: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PomodoroConfig {
    pub work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub pomodoros_until_long_break: u32,
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            pomodoros_until_long_break: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { debounce_ms: 800 }
    }
}

impl AppConfig {
    /// Loads `$LIFE_OS_CONFIG`, else `<data_dir>/config.yaml` when present,
    /// else defaults.
    pub fn load() -> AppResult<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }
        let candidate = default_data_dir()?.join(CONFIG_FILE);
        if candidate.is_file() {
            return Self::load_from(&candidate);
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|error| AppError::Config(format!("cannot read {}: {}", path.display(), error)))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        let positive = [
            ("pomodoro.work_minutes", u64::from(self.pomodoro.work_minutes)),
            ("pomodoro.short_break_minutes", u64::from(self.pomodoro.short_break_minutes)),
            ("pomodoro.long_break_minutes", u64::from(self.pomodoro.long_break_minutes)),
            (
                "pomodoro.pomodoros_until_long_break",
                u64::from(self.pomodoro.pomodoros_until_long_break),
            ),
            ("autosave.debounce_ms", self.autosave.debounce_ms),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(AppError::Config(format!("{} must be greater than zero", field)));
        }
        let windows = [
            ("calendar.days_to_show", self.calendar.days_to_show),
            ("calendar.future_days", self.calendar.future_days),
        ];
        if let Some((field, value)) = windows.iter().find(|(_, value)| *value > MAX_WINDOW_DAYS) {
            return Err(AppError::Config(format!(
                "{} is {}, the maximum is {}",
                field, value, MAX_WINDOW_DAYS
            )));
        }
        if self.log_level.trim().is_empty() {
            return Err(AppError::Config("log_level must not be empty".to_string()));
        }
        Ok(())
    }

    /// Explicit `data_dir` from the file wins over the environment default.
    pub fn resolved_data_dir(&self) -> AppResult<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    pub fn database_path(&self) -> AppResult<PathBuf> {
        Ok(self.resolved_data_dir()?.join(DATABASE_FILE))
    }

    pub fn pomodoro_settings(&self) -> PomodoroSettings {
        PomodoroSettings {
            work: minutes(self.pomodoro.work_minutes),
            short_break: minutes(self.pomodoro.short_break_minutes),
            long_break: minutes(self.pomodoro.long_break_minutes),
            long_break_every: self.pomodoro.pomodoros_until_long_break,
        }
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave.debounce_ms)
    }
}

fn minutes(value: u32) -> Duration {
    Duration::from_secs(u64::from(value) * 60)
}

fn default_data_dir() -> AppResult<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    #[cfg(unix)]
    let home = std::env::var_os("HOME");
    #[cfg(windows)]
    let home = std::env::var_os("USERPROFILE");
    #[cfg(not(any(unix, windows)))]
    let home: Option<std::ffi::OsString> = None;

    home.filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".life-os"))
        .ok_or_else(|| AppError::Config(format!("no home directory; set {}", DATA_DIR_ENV)))
}
