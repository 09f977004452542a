use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::jwt::AuthUser,
    domain::{now_naive, MonthKey},
    error::ApiError,
    measurements::{
        dto::{GlucoseDashboard, MeasurementCreated, MeasurementDto, MonthQuery},
        repo as measurements,
    },
    state::AppState,
    stats,
    validate::{validate_measurement, MeasurementForm},
};

/// Readings shown on the listing page.
const LIST_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/measurements", get(list_measurements).post(create_measurement))
        .route("/dashboard/glucose", get(glucose_dashboard))
}

/// Absent or malformed month keys fall back to the current month, so stale
/// dashboard links keep working.
fn month_from_query(query: &MonthQuery) -> MonthKey {
    query
        .month
        .as_deref()
        .and_then(MonthKey::parse)
        .unwrap_or_else(|| MonthKey::of(now_naive().date()))
}

#[instrument(skip(state))]
pub async fn list_measurements(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<MeasurementDto>>, ApiError> {
    let db = state.db().await;
    let rows = measurements::list_by_user(&db, user_id, Some(LIST_LIMIT)).await?;
    Ok(Json(rows.iter().map(MeasurementDto::from).collect()))
}

#[instrument(skip(state, form))]
pub async fn create_measurement(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(form): Json<MeasurementForm>,
) -> Result<(StatusCode, Json<MeasurementCreated>), ApiError> {
    let new = validate_measurement(&form).map_err(ApiError::Validation)?;

    let db = state.db().await;
    let measurement = measurements::insert(&db, user_id, &new).await?;

    info!(user_id, measurement_id = measurement.id, "measurement recorded");
    Ok((
        StatusCode::CREATED,
        Json(MeasurementCreated {
            message: "Medição registrada com sucesso.".into(),
            measurement: MeasurementDto::from(&measurement),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn glucose_dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<GlucoseDashboard>, ApiError> {
    let month = month_from_query(&query);
    let db = state.db().await;

    // headline numbers come from the full history, the breakdowns from the
    // selected month
    let all = measurements::list_by_user(&db, user_id, None).await?;
    let monthly = measurements::list_for_month(&db, user_id, month).await?;

    let series = stats::trend(&all);
    let (labels, values): (Vec<String>, Vec<f64>) = series.into_iter().unzip();
    let (min_val, max_val) = match stats::min_max(&all) {
        Some((lo, hi)) => (Some(lo), Some(hi)),
        None => (None, None),
    };
    let month_stats = stats::month_stats(&monthly, month);

    let (daily_labels, daily_avgs): (Vec<String>, Vec<f64>) =
        stats::daily_averages(&monthly, month).into_iter().unzip();
    let (context_labels, context_avgs): (Vec<String>, Vec<f64>) =
        stats::context_averages(&monthly, month).into_iter().unzip();

    Ok(Json(GlucoseDashboard {
        month_key: month.label(),
        latest_value: all.first().map(|m| m.glucose_level),
        count: all.len(),
        avg_7d: stats::rolling_average(&all, now_naive()),
        min_val,
        max_val,
        month_avg: month_stats.map(|s| s.avg),
        month_min: month_stats.map(|s| s.min),
        month_max: month_stats.map(|s| s.max),
        labels,
        values,
        daily_labels,
        daily_avgs,
        context_labels,
        context_avgs,
    }))
}
