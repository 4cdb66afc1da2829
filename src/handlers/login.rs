use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{generate_jwt, Claims};
use crate::config;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::EntityService;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Seconds until the token expires
    pub expires_in: u64,
    pub user: User,
}

/// POST /login - exchange credentials for a bearer token
pub async fn login(State(users): State<EntityService<User>>, Json(body): Json<LoginRequest>) -> ApiResult<LoginResponse> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::UnprocessableEntity("username and password are required".to_string()));
    }

    let Some(user) = users.login(&body.username, &body.password).await? else {
        return Err(ApiError::unauthorized("invalid username or password"));
    };

    let token = generate_jwt(&Claims::new(user.id.clone(), user.name.clone()))?;
    info!(user_id = %user.id, "user logged in");

    Ok(ApiResponse::success(LoginResponse {
        token,
        expires_in: config::config().security.jwt_expiry_hours * 3600,
        user,
    }))
}
