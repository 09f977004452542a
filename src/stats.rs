//! Dashboard statistics, computed over decoded records.
//!
//! Everything here is read-only and tolerates empty input: empty series stay
//! empty and missing statistics come back as `None`, never as zero.

use std::collections::BTreeMap;

use time::{Duration, PrimitiveDateTime};

use crate::activities::repo::Activity;
use crate::domain::{format_date, format_datetime, ActivityCategory, MeasurementContext, MonthKey};
use crate::measurements::repo::Measurement;

/// Month-scoped glucose statistics only look at days 1..=30. Day 31 is
/// dropped on purpose: the shipped dashboards are calibrated to that window.
const MONTH_CLOSE_DAY: u8 = 30;

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Full series as (timestamp label, value), oldest first.
pub fn trend(measurements: &[Measurement]) -> Vec<(String, f64)> {
    let mut sorted: Vec<&Measurement> = measurements.iter().collect();
    sorted.sort_by_key(|m| m.measured_at);
    sorted
        .iter()
        .map(|m| (format_datetime(m.measured_at), m.glucose_level))
        .collect()
}

/// Mean of the readings within the trailing 7 days.
pub fn rolling_average(measurements: &[Measurement], now: PrimitiveDateTime) -> Option<f64> {
    let cutoff = now - Duration::days(7);
    let recent: Vec<f64> = measurements
        .iter()
        .filter(|m| m.measured_at >= cutoff)
        .map(|m| m.glucose_level)
        .collect();
    mean(&recent)
}

/// Lowest and highest reading over the whole series.
pub fn min_max(measurements: &[Measurement]) -> Option<(f64, f64)> {
    measurements.iter().map(|m| m.glucose_level).fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

fn in_closed_month(m: &Measurement, month: MonthKey) -> bool {
    month.contains(m.measured_at.date()) && m.measured_at.date().day() <= MONTH_CLOSE_DAY
}

pub fn month_stats(measurements: &[Measurement], month: MonthKey) -> Option<MonthStats> {
    let values: Vec<f64> = measurements
        .iter()
        .filter(|m| in_closed_month(m, month))
        .map(|m| m.glucose_level)
        .collect();
    let avg = mean(&values)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(MonthStats { avg, min, max })
}

/// Per-day means for the month, day ascending. Same 1..=30 window as
/// `month_stats`.
pub fn daily_averages(measurements: &[Measurement], month: MonthKey) -> Vec<(String, f64)> {
    let mut by_day: BTreeMap<time::Date, Vec<f64>> = BTreeMap::new();
    for m in measurements.iter().filter(|m| in_closed_month(m, month)) {
        by_day.entry(m.measured_at.date()).or_default().push(m.glucose_level);
    }
    by_day
        .into_iter()
        .filter_map(|(day, values)| mean(&values).map(|avg| (format_date(day), avg)))
        .collect()
}

/// Per-context means for the month, ordered by context key ascending. A
/// context that no longer decodes groups under the placeholder label, whose
/// empty key sorts first.
pub fn context_averages(measurements: &[Measurement], month: MonthKey) -> Vec<(String, f64)> {
    let mut by_context: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
    for m in measurements.iter().filter(|m| month.contains(m.measured_at.date())) {
        let key = m.context.map(|c| c.as_str()).unwrap_or("");
        by_context.entry(key).or_default().push(m.glucose_level);
    }
    by_context
        .into_iter()
        .filter_map(|(key, values)| {
            let label = MeasurementContext::from_slug(key)
                .map(|c| c.label())
                .unwrap_or(MeasurementContext::UNKNOWN_LABEL);
            mean(&values).map(|avg| (label.to_string(), avg))
        })
        .collect()
}

/// Per-category totals for one month, in canonical category order.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySummary {
    pub counts_per_category: Vec<i64>,
    pub durations_per_category: Vec<i64>,
    pub total_activities: i64,
    pub total_minutes: i64,
    pub top_category: Option<ActivityCategory>,
}

impl ActivitySummary {
    pub fn top_category_label(&self) -> Option<&'static str> {
        self.top_category.map(|c| c.label())
    }
}

pub fn activity_summary(activities: &[Activity], month: MonthKey) -> ActivitySummary {
    let mut counts = vec![0_i64; ActivityCategory::ALL.len()];
    let mut durations = vec![0_i64; ActivityCategory::ALL.len()];

    for a in activities.iter().filter(|a| month.contains(a.performed_at.date())) {
        // entries with a category we no longer recognize cannot be attributed
        let Some(category) = a.category else { continue };
        let Some(idx) = ActivityCategory::ALL.iter().position(|c| *c == category) else {
            continue;
        };
        counts[idx] += 1;
        durations[idx] += a.duration_minutes;
    }

    // strict comparison keeps the first (canonical-order) category on ties
    let mut top_category = None;
    let mut top_count = 0_i64;
    for (idx, category) in ActivityCategory::ALL.iter().enumerate() {
        if counts[idx] > top_count {
            top_count = counts[idx];
            top_category = Some(*category);
        }
    }

    ActivitySummary {
        total_activities: counts.iter().sum(),
        total_minutes: durations.iter().sum(),
        counts_per_category: counts,
        durations_per_category: durations,
        top_category,
    }
}

/// Total activity minutes per day for the month, day ascending.
pub fn daily_durations(activities: &[Activity], month: MonthKey) -> Vec<(String, i64)> {
    let mut by_day: BTreeMap<time::Date, i64> = BTreeMap::new();
    for a in activities.iter().filter(|a| month.contains(a.performed_at.date())) {
        *by_day.entry(a.performed_at.date()).or_default() += a.duration_minutes;
    }
    by_day
        .into_iter()
        .map(|(day, total)| (format_date(day), total))
        .collect()
}
