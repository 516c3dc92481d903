use super::{plural, Widget};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    PomodoroSession, SessionType, Summary, WidgetCategory, WidgetConfig, WidgetPanel, WidgetProps, WidgetSizes,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const POMODORO_WIDGET_ID: &str = "pomodoro";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PomodoroSettings {
    pub work: Duration,
    pub short_break: Duration,
    pub long_break: Duration,
    pub long_break_every: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work: Duration::from_secs(25 * 60),
            short_break: Duration::from_secs(5 * 60),
            long_break: Duration::from_secs(15 * 60),
            long_break_every: 4,
        }
    }
}

impl PomodoroSettings {
    pub fn duration_of(&self, session_type: SessionType) -> Duration {
        match session_type {
            SessionType::Work => self.work,
            SessionType::ShortBreak => self.short_break,
            SessionType::LongBreak => self.long_break,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedSession {
    pub session_type: SessionType,
    pub duration: Duration,
}

/// Countdown timer that derives remaining time from the start instant rather
/// than from tick counts, so slow or skipped ticks never drift.
#[derive(Debug, Clone)]
pub struct PomodoroTimer {
    settings: PomodoroSettings,
    state: TimerState,
    session_type: SessionType,
    started_at: Option<Instant>,
    banked: Duration,
    completed_work: u32,
}

impl PomodoroTimer {
    pub fn new(settings: PomodoroSettings) -> Self {
        Self {
            settings,
            state: TimerState::Idle,
            session_type: SessionType::Work,
            started_at: None,
            banked: Duration::ZERO,
            completed_work: 0,
        }
    }

    /// Seeds the number of work sessions already completed today.
    pub fn with_completed(mut self, completed_work: u32) -> Self {
        self.completed_work = completed_work;
        self
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn completed_work(&self) -> u32 {
        self.completed_work
    }

    pub fn total_time(&self) -> Duration {
        self.settings.duration_of(self.session_type)
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let running = self
            .started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        (self.banked + running).min(self.total_time())
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        if self.state == TimerState::Complete {
            return Duration::ZERO;
        }
        self.total_time().saturating_sub(self.elapsed(now))
    }

    /// Starts a fresh session or resumes a paused one.
    pub fn start(&mut self, now: Instant) {
        match self.state {
            TimerState::Running => return,
            TimerState::Paused => {}
            TimerState::Idle | TimerState::Complete => self.banked = Duration::ZERO,
        }
        self.started_at = Some(now);
        self.state = TimerState::Running;
    }

    pub fn pause(&mut self, now: Instant) {
        if self.state != TimerState::Running {
            return;
        }
        if let Some(started) = self.started_at.take() {
            self.banked += now.saturating_duration_since(started);
        }
        self.state = TimerState::Paused;
    }

    pub fn reset(&mut self) {
        self.clear(self.session_type);
    }

    /// Advances the timer. Returns the finished session exactly once, on the
    /// tick that reaches zero.
    pub fn tick(&mut self, now: Instant) -> Option<CompletedSession> {
        if self.state != TimerState::Running || !self.remaining(now).is_zero() {
            return None;
        }
        self.started_at = None;
        self.banked = self.total_time();
        self.state = TimerState::Complete;
        if self.session_type == SessionType::Work {
            self.completed_work += 1;
        }
        Some(CompletedSession {
            session_type: self.session_type,
            duration: self.total_time(),
        })
    }

    /// Work is followed by a long break every `long_break_every` completed
    /// work sessions and a short break otherwise; any break is followed by work.
    pub fn start_next_session(&mut self) {
        let next = match self.session_type {
            SessionType::Work => {
                let every = self.settings.long_break_every;
                if self.completed_work > 0 && every > 0 && self.completed_work % every == 0 {
                    SessionType::LongBreak
                } else {
                    SessionType::ShortBreak
                }
            }
            SessionType::ShortBreak | SessionType::LongBreak => SessionType::Work,
        };
        self.clear(next);
    }

    pub fn skip_to(&mut self, session_type: SessionType) {
        self.clear(session_type);
    }

    fn clear(&mut self, session_type: SessionType) {
        self.session_type = session_type;
        self.state = TimerState::Idle;
        self.started_at = None;
        self.banked = Duration::ZERO;
    }
}

pub fn format_clock(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub struct PomodoroWidget {
    db: Arc<Database>,
    settings: PomodoroSettings,
}

impl PomodoroWidget {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_settings(db, PomodoroSettings::default())
    }

    pub fn with_settings(db: Arc<Database>, settings: PomodoroSettings) -> Self {
        Self { db, settings }
    }

    pub fn today_pomodoro_count(&self, today: NaiveDate) -> AppResult<usize> {
        Ok(self.db.pomodoro_summary(today)?.count)
    }

    /// A timer that knows how many work sessions `date` already has.
    pub fn timer(&self, date: NaiveDate) -> AppResult<PomodoroTimer> {
        let completed = u32::try_from(self.today_pomodoro_count(date)?).unwrap_or(u32::MAX);
        Ok(PomodoroTimer::new(self.settings).with_completed(completed))
    }

    /// Runs the timer's current session to the end and records it.
    pub async fn run_session(
        &self,
        timer: &mut PomodoroTimer,
        date: NaiveDate,
        resolution: Duration,
    ) -> AppResult<PomodoroSession> {
        if resolution.is_zero() {
            return Err(AppError::Validation("tick resolution must be positive".to_string()));
        }
        let mut ticker = tokio::time::interval(resolution);
        timer.start(Instant::now());
        tracing::info!(
            session_type = timer.session_type().as_str(),
            total_secs = timer.total_time().as_secs(),
            "pomodoro session started"
        );
        loop {
            ticker.tick().await;
            if let Some(done) = timer.tick(Instant::now()) {
                let secs = u32::try_from(done.duration.as_secs()).unwrap_or(u32::MAX);
                let session = self.db.add_session(date, done.session_type, secs)?;
                tracing::info!(session_id = session.id, session_type = done.session_type.as_str(), "pomodoro session recorded");
                return Ok(session);
            }
        }
    }
}

#[async_trait]
impl Widget for PomodoroWidget {
    fn config(&self) -> WidgetConfig {
        WidgetConfig {
            id: POMODORO_WIDGET_ID.to_string(),
            name: "Pomodoro Timer".to_string(),
            description: "Focus timer using the Pomodoro Technique".to_string(),
            icon: "timer".to_string(),
            category: WidgetCategory::Productivity,
            sizes: WidgetSizes {
                min_w: 2,
                min_h: 3,
                max_w: Some(4),
                max_h: Some(5),
                default_w: 2,
                default_h: 3,
            },
        }
    }

    async fn render(&self, props: &WidgetProps) -> AppResult<WidgetPanel> {
        let sessions = self.db.sessions_for_date(props.date)?;
        let work = sessions
            .iter()
            .filter(|session| session.session_type == SessionType::Work)
            .count();
        let mut lines = vec![
            format!("Focus {}", format_clock(self.settings.work)),
            format!("🍅 × {}", work),
        ];
        lines.extend(sessions.iter().map(|session| {
            format!(
                "{} {} ({} min)",
                session.completed_at.format("%H:%M"),
                session.session_type.as_str(),
                (f64::from(session.duration_secs) / 60.0).round()
            )
        }));
        Ok(WidgetPanel {
            widget_id: props.id.clone(),
            title: "Pomodoro Timer".to_string(),
            lines,
        })
    }

    async fn summarize(&self, date: NaiveDate) -> AppResult<Summary> {
        let summary = self.db.pomodoro_summary(date)?;
        Ok(Summary {
            widget_id: POMODORO_WIDGET_ID.to_string(),
            primary: format!("🍅 {}", plural(summary.count, "pomodoro")),
            secondary: Some(format!("{} min focused", summary.total_minutes)),
            color: "pomodoro".to_string(),
            has_data: summary.count > 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{format_clock, PomodoroSettings, PomodoroTimer, PomodoroWidget, TimerState};
    use crate::db::Database;
    use crate::models::SessionType;
    use crate::widgets::Widget;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn settings() -> PomodoroSettings {
        PomodoroSettings {
            work: Duration::from_secs(10),
            short_break: Duration::from_secs(2),
            long_break: Duration::from_secs(5),
            long_break_every: 2,
        }
    }

    #[test]
    fn pause_and_resume_do_not_count_paused_time() {
        let t0 = Instant::now();
        let mut timer = PomodoroTimer::new(settings());
        timer.start(t0);
        timer.pause(t0 + Duration::from_secs(4));
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.remaining(t0 + Duration::from_secs(100)), Duration::from_secs(6));

        timer.start(t0 + Duration::from_secs(100));
        assert!(timer.tick(t0 + Duration::from_secs(105)).is_none());
        let done = timer.tick(t0 + Duration::from_secs(106)).expect("complete");
        assert_eq!(done.session_type, SessionType::Work);
        assert_eq!(timer.state(), TimerState::Complete);
        assert!(timer.tick(t0 + Duration::from_secs(107)).is_none());
        assert_eq!(timer.completed_work(), 1);
    }

    #[test]
    fn breaks_alternate_with_a_long_break_every_n_work_sessions() {
        let mut t = Instant::now();
        let mut timer = PomodoroTimer::new(settings());
        let mut sequence = Vec::new();
        for _ in 0..6 {
            timer.start(t);
            t += timer.total_time();
            let done = timer.tick(t).expect("complete");
            sequence.push(done.session_type);
            timer.start_next_session();
        }
        assert_eq!(
            sequence,
            vec![
                SessionType::Work,
                SessionType::ShortBreak,
                SessionType::Work,
                SessionType::LongBreak,
                SessionType::Work,
                SessionType::ShortBreak,
            ]
        );
    }

    #[test]
    fn skip_and_reset_return_to_idle() {
        let t0 = Instant::now();
        let mut timer = PomodoroTimer::new(settings());
        timer.start(t0);
        timer.skip_to(SessionType::LongBreak);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.remaining(t0 + Duration::from_secs(1)), Duration::from_secs(5));

        timer.start(t0);
        timer.reset();
        assert_eq!(timer.session_type(), SessionType::LongBreak);
        assert_eq!(timer.remaining(t0 + Duration::from_secs(3)), Duration::from_secs(5));
        assert_eq!(format_clock(Duration::from_secs(25 * 60)), "25:00");
    }

    #[tokio::test]
    async fn finished_session_is_recorded_and_summarised() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Database::new(&dir.path().join("test.db")).expect("db"));
        let quick = PomodoroSettings {
            work: Duration::from_millis(60),
            ..settings()
        };
        let widget = PomodoroWidget::with_settings(db.clone(), quick);
        let date = NaiveDate::from_ymd_opt(2024, 8, 1).expect("date");

        let mut timer = widget.timer(date).expect("timer");
        let session = widget
            .run_session(&mut timer, date, Duration::from_millis(10))
            .await
            .expect("session");
        assert_eq!(session.session_type, SessionType::Work);
        assert_eq!(widget.today_pomodoro_count(date).expect("count"), 1);
        assert_eq!(widget.timer(date).expect("timer").completed_work(), 1);

        let summary = widget.summarize(date).await.expect("summary");
        assert!(summary.has_data);
        assert_eq!(summary.primary, "🍅 1 pomodoro");
        assert_eq!(summary.secondary.as_deref(), Some("0 min focused"));
    }
}
