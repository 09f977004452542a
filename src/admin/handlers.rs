use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    admin::dto::{AdminUserDto, DatabaseInfo},
    auth::{dto::MessageResponse, jwt::AdminSession},
    error::ApiError,
    state::AppState,
    users::repo as users,
};

/// Uploaded data files are small; this bound only guards against mistakes.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/activate", post(activate_user))
        .route("/admin/users/:id/deactivate", post(deactivate_user))
        .route("/admin/users/:id", delete(delete_user))
        .route("/admin/db", get(database_info).post(replace_database))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    _session: AdminSession,
) -> Result<Json<Vec<AdminUserDto>>, ApiError> {
    let db = state.db().await;
    let rows = users::list_all(&db).await?;
    Ok(Json(rows.iter().map(AdminUserDto::from).collect()))
}

#[instrument(skip(state))]
pub async fn activate_user(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(user_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.db().await;
    if !users::set_active(&db, user_id, true).await? {
        return Err(ApiError::NotFound("usuário não encontrado"));
    }
    info!(user_id, "user activated");
    Ok(Json(MessageResponse {
        message: "Usuário ativado.".into(),
    }))
}

#[instrument(skip(state))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(user_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.db().await;
    if !users::set_active(&db, user_id, false).await? {
        return Err(ApiError::NotFound("usuário não encontrado"));
    }
    info!(user_id, "user deactivated");
    Ok(Json(MessageResponse {
        message: "Usuário desativado.".into(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(user_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.db().await;
    if !users::delete(&db, user_id).await? {
        return Err(ApiError::NotFound("usuário não encontrado"));
    }
    info!(user_id, "user deleted with all records");
    Ok(Json(MessageResponse {
        message: "Usuário excluído com todos os seus registros.".into(),
    }))
}

#[instrument(skip(state))]
pub async fn database_info(
    State(state): State<AppState>,
    _session: AdminSession,
) -> Result<Json<DatabaseInfo>, ApiError> {
    let path = &state.config.database_path;
    let size_bytes = match tokio::fs::metadata(path).await {
        Ok(meta) => Some(meta.len()),
        Err(_) => None,
    };
    Ok(Json(DatabaseInfo {
        path: path.display().to_string(),
        size_bytes,
    }))
}

#[instrument(skip(state, multipart))]
pub async fn replace_database(
    State(state): State<AppState>,
    _session: AdminSession,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut data = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(vec![format!("Upload inválido: {e}.")]))?
    {
        if field.name() == Some("database") || field.file_name().is_some() {
            data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(vec![format!("Upload inválido: {e}.")]))?,
            );
            break;
        }
    }

    let data = match data {
        Some(d) if !d.is_empty() => d,
        _ => {
            return Err(ApiError::Validation(vec![
                "Envie o arquivo do banco de dados no campo 'database'.".into(),
            ]))
        }
    };

    if let Err(e) = state.replace_database(&data).await {
        warn!(error = %format!("{e:#}"), "data file replacement rejected");
        return Err(ApiError::Storage(format!("{e:#}")));
    }

    info!(size_bytes = data.len(), "data file replaced by administrator");
    Ok(Json(MessageResponse {
        message: "Banco de dados substituído com sucesso.".into(),
    }))
}
