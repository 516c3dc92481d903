use super::{plural, Widget};
use crate::calendar::window_start;
use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{
    MoodEntry, MoodTrendPoint, Summary, WidgetCategory, WidgetConfig, WidgetPanel, WidgetProps, WidgetSizes,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MOOD_WIDGET_ID: &str = "mood";

pub struct MoodWidget {
    db: Arc<Database>,
}

impl MoodWidget {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Daily averages for the `days` days ending at `today`, oldest first.
    /// Days without entries carry `None`.
    pub fn trend(&self, today: NaiveDate, days: u32) -> AppResult<Vec<MoodTrendPoint>> {
        mood_trend(&self.db, today, days)
    }
}

pub fn mood_trend(db: &Database, today: NaiveDate, days: u32) -> AppResult<Vec<MoodTrendPoint>> {
    if days == 0 {
        return Ok(Vec::new());
    }
    let start = window_start(today, days)?;
    let mut by_day: BTreeMap<NaiveDate, Vec<MoodEntry>> = BTreeMap::new();
    for entry in db.moods_for_range(start, today)? {
        by_day.entry(entry.date).or_default().push(entry);
    }

    Ok(start
        .iter_days()
        .take(days as usize)
        .map(|date| {
            let entries = by_day.get(&date).map(Vec::as_slice).unwrap_or_default();
            let moods: Vec<f64> = entries.iter().map(|e| f64::from(e.mood.value())).collect();
            let energies: Vec<f64> = entries
                .iter()
                .filter_map(|e| e.energy.map(|level| f64::from(level.value())))
                .collect();
            MoodTrendPoint {
                date,
                day_label: date.format("%a").to_string(),
                mood: average(&moods),
                energy: average(&energies),
            }
        })
        .collect())
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

#[async_trait]
impl Widget for MoodWidget {
    fn config(&self) -> WidgetConfig {
        WidgetConfig {
            id: MOOD_WIDGET_ID.to_string(),
            name: "Mood Tracker".to_string(),
            description: "Log your mood and energy levels".to_string(),
            icon: "smile-plus".to_string(),
            category: WidgetCategory::Wellness,
            sizes: WidgetSizes {
                min_w: 2,
                min_h: 2,
                max_w: Some(6),
                max_h: Some(4),
                default_w: 4,
                default_h: 2,
            },
        }
    }

    async fn render(&self, props: &WidgetProps) -> AppResult<WidgetPanel> {
        let entries = self.db.moods_for_date(props.date)?;
        let mut lines: Vec<String> = entries
            .iter()
            .map(|entry| {
                let mut line = format!("#{} {} {}", entry.id, entry.mood.emoji(), entry.mood.label());
                if let Some(energy) = entry.energy {
                    line.push_str(&format!(" ⚡{}/10", energy.value()));
                }
                if !entry.tags.is_empty() {
                    let tags: Vec<&str> = entry.tags.iter().map(|tag| tag.as_str()).collect();
                    line.push_str(&format!(" [{}]", tags.join(", ")));
                }
                if let Some(note) = &entry.note {
                    line.push_str(&format!(" · {}", note));
                }
                line
            })
            .collect();
        if lines.is_empty() {
            lines.push("How are you feeling?".to_string());
        }
        if let Some(average) = self.db.average_mood_for_date(props.date)? {
            if entries.len() > 1 {
                lines.push(format!("Average {:.1}", average));
            }
        }
        Ok(WidgetPanel {
            widget_id: props.id.clone(),
            title: "Mood Tracker".to_string(),
            lines,
        })
    }

    async fn summarize(&self, date: NaiveDate) -> AppResult<Summary> {
        let summary = self.db.mood_summary(date)?;
        let Some(mood) = summary.mood else {
            return Ok(Summary {
                widget_id: MOOD_WIDGET_ID.to_string(),
                primary: "No mood logged".to_string(),
                secondary: None,
                color: "mood".to_string(),
                has_data: false,
            });
        };
        Ok(Summary {
            widget_id: MOOD_WIDGET_ID.to_string(),
            primary: format!("{} {}", mood.emoji(), mood.label()),
            secondary: (summary.count > 1).then(|| plural(summary.count, "check-in")),
            color: "mood".to_string(),
            has_data: true,
        })
    }
}
