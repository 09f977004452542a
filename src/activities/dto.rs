use serde::{Deserialize, Serialize};

use crate::activities::repo::Activity;
use crate::domain::{format_datetime, ActivityCategory};
use crate::stats::ActivitySummary;

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActivityDto {
    pub id: i64,
    pub category: Option<ActivityCategory>,
    pub category_label: Option<&'static str>,
    pub performed_at: String,
    pub duration_minutes: i64,
}

impl From<&Activity> for ActivityDto {
    fn from(a: &Activity) -> Self {
        Self {
            id: a.id,
            category: a.category,
            category_label: a.category.map(|c| c.label()),
            performed_at: format_datetime(a.performed_at),
            duration_minutes: a.duration_minutes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityCreated {
    pub message: String,
    pub activity: ActivityDto,
}

/// One non-empty category on the listing page's month summary.
#[derive(Debug, Serialize)]
pub struct CategorySummary {
    pub category: ActivityCategory,
    pub label: &'static str,
    pub count: i64,
    pub total_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesPage {
    pub entries: Vec<ActivityDto>,
    pub month_key: String,
    pub summary: Vec<CategorySummary>,
}

/// Per-category series follow the canonical category order, so
/// `category_labels[i]` matches `counts_per_category[i]`.
#[derive(Debug, Serialize)]
pub struct ActivityDashboard {
    pub month_key: String,
    pub category_labels: Vec<&'static str>,
    pub counts_per_category: Vec<i64>,
    pub durations_per_category: Vec<i64>,
    pub labels_days: Vec<String>,
    pub durations_daily: Vec<i64>,
    pub total_activities: i64,
    pub total_minutes: i64,
    pub top_category_label: Option<&'static str>,
}

pub fn category_summaries(summary: &ActivitySummary) -> Vec<CategorySummary> {
    ActivityCategory::ALL
        .iter()
        .enumerate()
        .filter(|(idx, _)| summary.counts_per_category[*idx] > 0)
        .map(|(idx, category)| CategorySummary {
            category: *category,
            label: category.label(),
            count: summary.counts_per_category[idx],
            total_minutes: summary.durations_per_category[idx],
        })
        .collect()
}
