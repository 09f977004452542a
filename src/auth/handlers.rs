use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest,
            MessageResponse, PublicUser, ResetPasswordRequest,
        },
        jwt::{Role, SessionKeys},
        password::{hash_password, verify_password},
    },
    error::ApiError,
    state::AppState,
    users::repo as users,
    validate::{validate_password_reset, validate_register, RegisterForm},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/forgot_password", post(forgot_password))
        .route("/auth/reset_password", post(reset_password))
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let db = state.db().await;

    let mut errors = Vec::new();
    let new_user = match validate_register(&form) {
        Ok(u) => Some(u),
        Err(e) => {
            errors.extend(e);
            None
        }
    };

    // uniqueness is checked against the normalized values the validator uses
    let email = form.email.trim().to_lowercase();
    let username = form.username.trim().to_lowercase();
    if !email.is_empty() && users::email_taken(&db, &email, None).await? {
        errors.push("E-mail já cadastrado.".into());
    }
    if !username.is_empty() {
        if username == state.config.admin.username {
            errors.push("Login indisponível.".into());
        } else if users::username_taken(&db, &username, None).await? {
            errors.push("Login já cadastrado.".into());
        }
    }

    let new_user = match (new_user, errors.is_empty()) {
        (Some(u), true) => u,
        _ => {
            warn!(error_count = errors.len(), "registration rejected");
            return Err(ApiError::Validation(errors));
        }
    };

    let hash = hash_password(&new_user.password)?;
    let user = match users::create(&db, &new_user.profile, &hash).await {
        Ok(u) => u,
        Err(e) if users::is_unique_violation(&e) => {
            return Err(ApiError::Conflict("E-mail ou login já cadastrado."));
        }
        Err(e) => return Err(e.into()),
    };

    let keys = SessionKeys::from_ref(&state);
    let token = keys.sign_user(user.id)?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            role: Role::User,
            user: Some(PublicUser::from(&user)),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let username = payload.username.trim().to_lowercase();
    if username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(vec!["Informe usuário e senha.".into()]));
    }

    let keys = SessionKeys::from_ref(&state);

    // bootstrap administrator, not a user row
    if username == state.config.admin.username {
        if payload.password == state.config.admin.password {
            let token = keys.sign_admin()?;
            info!("administrator logged in");
            return Ok(Json(AuthResponse {
                token,
                role: Role::Admin,
                user: None,
            }));
        }
        warn!("administrator login with wrong password");
        return Err(ApiError::Unauthorized("usuário ou senha inválidos"));
    }

    let db = state.db().await;
    let user = match users::find_by_username(&db, &username).await? {
        Some(u) => u,
        None => {
            warn!(username = %username, "login with unknown username");
            return Err(ApiError::Unauthorized("usuário ou senha inválidos"));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login with wrong password");
        return Err(ApiError::Unauthorized("usuário ou senha inválidos"));
    }

    if !user.active {
        warn!(user_id = user.id, "login on deactivated account");
        return Err(ApiError::Unauthorized("conta desativada; procure o administrador"));
    }

    let token = keys.sign_user(user.id)?;
    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(Json(AuthResponse {
        token,
        role: Role::User,
        user: Some(PublicUser::from(&user)),
    }))
}

/// Sessions are stateless tokens; logging out is discarding the token on the
/// client. The endpoint only acknowledges, so existing clients keep working.
#[instrument]
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Você saiu da sua conta.".into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, ApiError> {
    let username = payload.username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::Validation(vec!["Informe o login.".into()]));
    }

    let db = state.db().await;
    let user = users::find_by_username(&db, &username)
        .await?
        .ok_or(ApiError::NotFound("login não encontrado"))?;

    let keys = SessionKeys::from_ref(&state);
    let reset_token = keys.sign_reset(user.id)?;

    info!(user_id = user.id, "password reset requested");
    Ok(Json(ForgotPasswordResponse {
        reset_token,
        message: "Login localizado. Informe a nova senha.".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let keys = SessionKeys::from_ref(&state);
    let claims = keys
        .verify_reset(&payload.reset_token)
        .map_err(|_| ApiError::Unauthorized("fluxo de redefinição inválido; informe seu login"))?;

    validate_password_reset(&payload.new_password, &payload.confirm_password)
        .map_err(ApiError::Validation)?;

    let db = state.db().await;
    let hash = hash_password(&payload.new_password)?;
    if !users::update_password(&db, claims.sub, &hash).await? {
        return Err(ApiError::NotFound("usuário não encontrado"));
    }

    info!(user_id = claims.sub, "password reset completed");
    Ok(Json(MessageResponse {
        message: "Senha redefinida com sucesso. Faça login.".into(),
    }))
}
