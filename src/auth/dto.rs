use serde::{Deserialize, Serialize};

use crate::auth::jwt::Role;
use crate::users::repo::User;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub reset_token: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub reset_token: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// Response for login and registration. `user` is absent for the bootstrap
/// administrator, which has no user record.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub role: Role,
    pub user: Option<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
