use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    alerts::{
        dto::{AlertDto, AlertSaved, AlertsData},
        repo as alerts,
    },
    auth::{dto::MessageResponse, jwt::AuthUser},
    error::ApiError,
    state::AppState,
    validate::{validate_alert, AlertForm},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts).post(create_alert))
        .route("/alerts/:id", put(update_alert).delete(delete_alert))
        .route("/alerts/data", get(alerts_data))
}

#[instrument(skip(state))]
pub async fn list_alerts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<AlertDto>>, ApiError> {
    let db = state.db().await;
    let rows = alerts::list_by_user(&db, user_id).await?;
    Ok(Json(rows.iter().map(AlertDto::from).collect()))
}

/// Same list as `/alerts`, wrapped the way the notification poller expects.
#[instrument(skip(state))]
pub async fn alerts_data(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AlertsData>, ApiError> {
    let db = state.db().await;
    let rows = alerts::list_by_user(&db, user_id).await?;
    Ok(Json(AlertsData {
        alerts: rows.iter().map(AlertDto::from).collect(),
    }))
}

#[instrument(skip(state, form))]
pub async fn create_alert(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(form): Json<AlertForm>,
) -> Result<(StatusCode, Json<AlertSaved>), ApiError> {
    let new = validate_alert(&form).map_err(ApiError::Validation)?;

    let db = state.db().await;
    let alert = alerts::insert(&db, user_id, &new).await?;

    info!(user_id, alert_id = alert.id, "alert created");
    Ok((
        StatusCode::CREATED,
        Json(AlertSaved {
            message: "Alerta criado com sucesso.".into(),
            alert: AlertDto::from(&alert),
        }),
    ))
}

#[instrument(skip(state, form))]
pub async fn update_alert(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(alert_id): Path<i64>,
    Json(form): Json<AlertForm>,
) -> Result<Json<MessageResponse>, ApiError> {
    let new = validate_alert(&form).map_err(ApiError::Validation)?;

    let db = state.db().await;
    if !alerts::update(&db, user_id, alert_id, &new).await? {
        return Err(ApiError::NotFound("alerta não encontrado"));
    }

    info!(user_id, alert_id, "alert updated");
    Ok(Json(MessageResponse {
        message: "Alerta atualizado com sucesso.".into(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_alert(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(alert_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.db().await;
    if !alerts::delete(&db, user_id, alert_id).await? {
        return Err(ApiError::NotFound("alerta não encontrado"));
    }

    info!(user_id, alert_id, "alert deleted");
    Ok(Json(MessageResponse {
        message: "Alerta excluído com sucesso.".into(),
    }))
}
