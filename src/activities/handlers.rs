use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    activities::{
        dto::{
            category_summaries, ActivitiesPage, ActivityCreated, ActivityDashboard, ActivityDto,
            MonthQuery,
        },
        repo as activities,
    },
    auth::jwt::AuthUser,
    domain::{now_naive, ActivityCategory, MonthKey},
    error::ApiError,
    state::AppState,
    stats,
    validate::{validate_activity, ActivityForm},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activities", get(list_activities).post(create_activity))
        .route("/dashboard/activities", get(activity_dashboard))
}

/// Absent or malformed month keys fall back to the current month.
fn month_from_query(query: &MonthQuery) -> MonthKey {
    query
        .month
        .as_deref()
        .and_then(MonthKey::parse)
        .unwrap_or_else(|| MonthKey::of(now_naive().date()))
}

#[instrument(skip(state))]
pub async fn list_activities(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ActivitiesPage>, ApiError> {
    let month = MonthKey::of(now_naive().date());
    let db = state.db().await;

    let entries = activities::list_by_user(&db, user_id, None).await?;
    let monthly = activities::list_for_month(&db, user_id, month).await?;
    let summary = stats::activity_summary(&monthly, month);

    Ok(Json(ActivitiesPage {
        entries: entries.iter().map(ActivityDto::from).collect(),
        month_key: month.label(),
        summary: category_summaries(&summary),
    }))
}

#[instrument(skip(state, form))]
pub async fn create_activity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(form): Json<ActivityForm>,
) -> Result<(StatusCode, Json<ActivityCreated>), ApiError> {
    let new = validate_activity(&form).map_err(ApiError::Validation)?;

    let db = state.db().await;
    let activity = activities::insert(&db, user_id, &new).await?;

    info!(user_id, activity_id = activity.id, "activity recorded");
    Ok((
        StatusCode::CREATED,
        Json(ActivityCreated {
            message: "Atividade registrada com sucesso.".into(),
            activity: ActivityDto::from(&activity),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn activity_dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<ActivityDashboard>, ApiError> {
    let month = month_from_query(&query);
    let db = state.db().await;

    let monthly = activities::list_for_month(&db, user_id, month).await?;
    let summary = stats::activity_summary(&monthly, month);
    let (labels_days, durations_daily): (Vec<String>, Vec<i64>) =
        stats::daily_durations(&monthly, month).into_iter().unzip();

    Ok(Json(ActivityDashboard {
        month_key: month.label(),
        category_labels: ActivityCategory::ALL.iter().map(|c| c.label()).collect(),
        top_category_label: summary.top_category_label(),
        counts_per_category: summary.counts_per_category,
        durations_per_category: summary.durations_per_category,
        labels_days,
        durations_daily,
        total_activities: summary.total_activities,
        total_minutes: summary.total_minutes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::activity_summary;
    use crate::{activities::dto::category_summaries, activities::repo::Activity};
    use time::macros::datetime;

    #[test]
    fn summary_skips_empty_categories() {
        let acts = vec![Activity {
            id: 1,
            user_id: 1,
            category: Some(ActivityCategory::Pilates),
            performed_at: datetime!(2024-01-10 07:00),
            duration_minutes: 20,
        }];
        let month = MonthKey::parse("2024-01").unwrap();
        let items = category_summaries(&activity_summary(&acts, month));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "Pilates");
        assert_eq!(items[0].count, 1);
        assert_eq!(items[0].total_minutes, 20);
    }
}
