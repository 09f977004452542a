use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        jwt::AuthUser,
        password::{hash_password, verify_password},
    },
    error::ApiError,
    state::AppState,
    users::{
        dto::{AccountDto, AccountUpdated},
        repo as users,
    },
    validate::{validate_account, AccountForm},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/account", get(get_account).put(update_account))
}

#[instrument(skip(state))]
pub async fn get_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AccountDto>, ApiError> {
    let db = state.db().await;
    let user = users::find_by_id(&db, user_id)
        .await?
        .ok_or(ApiError::Unauthorized("sessão inválida"))?;
    Ok(Json(AccountDto::from(&user)))
}

#[instrument(skip(state, form))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(form): Json<AccountForm>,
) -> Result<Json<AccountUpdated>, ApiError> {
    let db = state.db().await;
    let user = users::find_by_id(&db, user_id)
        .await?
        .ok_or(ApiError::Unauthorized("sessão inválida"))?;

    let mut errors = Vec::new();
    let update = match validate_account(&form) {
        Ok(u) => Some(u),
        Err(e) => {
            errors.extend(e);
            None
        }
    };

    // uniqueness excludes the record being edited
    let email = form.email.trim().to_lowercase();
    let username = form.username.trim().to_lowercase();
    if !email.is_empty() && users::email_taken(&db, &email, Some(user_id)).await? {
        errors.push("E-mail já cadastrado.".into());
    }
    if !username.is_empty() {
        if username == state.config.admin.username {
            errors.push("Login indisponível.".into());
        } else if users::username_taken(&db, &username, Some(user_id)).await? {
            errors.push("Login já cadastrado.".into());
        }
    }

    if let Some(u) = &update {
        if u.new_password.is_some()
            && !form.current_password.is_empty()
            && !verify_password(&form.current_password, &user.password_hash)?
        {
            errors.push("Senha atual incorreta.".into());
        }
    }

    let update = match (update, errors.is_empty()) {
        (Some(u), true) => u,
        _ => {
            warn!(user_id, error_count = errors.len(), "account update rejected");
            return Err(ApiError::Validation(errors));
        }
    };

    match users::update_profile(&db, user_id, &update.profile).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::NotFound("usuário não encontrado")),
        Err(e) if users::is_unique_violation(&e) => {
            return Err(ApiError::Conflict("E-mail ou login já cadastrado."));
        }
        Err(e) => return Err(e.into()),
    }
    if let Some(new_password) = update.new_password {
        let hash = hash_password(&new_password)?;
        users::update_password(&db, user_id, &hash).await?;
        info!(user_id, "password changed on account edit");
    }

    let user = users::find_by_id(&db, user_id)
        .await?
        .ok_or(ApiError::NotFound("usuário não encontrado"))?;
    info!(user_id, "account updated");
    Ok(Json(AccountUpdated {
        message: "Dados atualizados com sucesso.".into(),
        user: AccountDto::from(&user),
    }))
}
