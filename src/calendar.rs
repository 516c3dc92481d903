use crate::errors::{AppError, AppResult};
use crate::models::{DayCell, Summary};
use crate::widgets::WidgetRegistry;
use chrono::{Days, NaiveDate};
use futures_util::future::join_all;

/// Longest date window (calendar strip side or mood trend) a caller may ask for.
pub const MAX_WINDOW_DAYS: u32 = 366;

pub async fn day_summary(registry: &WidgetRegistry, date: NaiveDate) -> Vec<Summary> {
    registry.collect_summaries(date).await
}

/// First day of a window of `days` days ending at `end`.
pub fn window_start(end: NaiveDate, days: u32) -> AppResult<NaiveDate> {
    if days > MAX_WINDOW_DAYS {
        return Err(AppError::Validation(format!(
            "window of {} days exceeds the maximum of {}",
            days, MAX_WINDOW_DAYS
        )));
    }
    end.checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .ok_or_else(|| AppError::Validation(format!("window of {} days before {} is out of range", days, end)))
}

/// Cells for `days_to_show` days ending at `today` followed by `future_days`
/// upcoming days. With `days_to_show == 0` the strip starts tomorrow.
/// Dates are summarised concurrently.
pub async fn calendar_strip(
    registry: &WidgetRegistry,
    today: NaiveDate,
    days_to_show: u32,
    future_days: u32,
) -> AppResult<Vec<DayCell>> {
    if future_days > MAX_WINDOW_DAYS {
        return Err(AppError::Validation(format!(
            "future_days {} exceeds the maximum of {}",
            future_days, MAX_WINDOW_DAYS
        )));
    }
    if days_to_show == 0 && future_days == 0 {
        return Ok(Vec::new());
    }
    let first = match days_to_show {
        0 => today.succ_opt(),
        past => Some(window_start(today, past)?),
    };
    let last = today.checked_add_days(Days::new(u64::from(future_days)));
    let (Some(first), Some(last)) = (first, last) else {
        return Err(AppError::Validation(format!("calendar window around {} is out of range", today)));
    };
    let dates: Vec<NaiveDate> = first.iter_days().take_while(|date| *date <= last).collect();

    let summaries = join_all(dates.iter().map(|date| day_summary(registry, *date))).await;
    Ok(dates
        .into_iter()
        .zip(summaries)
        .map(|(date, summaries)| DayCell {
            date,
            is_today: date == today,
            colors: summaries.iter().map(|summary| summary.color.clone()).collect(),
            summaries,
        })
        .collect())
}
