/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /token
/// Content-Type: application/x-www-form-urlencoded
///
/// username=jdoe&password=secret123
/// ```
///
/// # Response
///
/// ```json
/// {
///   "access_token": "eyJ...",
///   "token_type": "bearer"
/// }
/// ```
///
/// Unknown users and wrong passwords both return the same 401.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiForm,
};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use taskhub_shared::auth::jwt::{self, Claims, TOKEN_TYPE};

/// Password-grant form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Issued bearer token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Exchanges a username and password for an access token
///
/// # Errors
///
/// - `401 Unauthorized`: Incorrect username or password
pub async fn login(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .users
        .authenticate(&form.username, &form.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Incorrect username or password".to_string()))?;

    let claims = Claims::new(user.username.clone(), state.config.token_lifetime());
    let access_token = jwt::create_token(&claims, state.jwt_secret())?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: TOKEN_TYPE.to_string(),
    }))
}
