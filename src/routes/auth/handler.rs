use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    store::{DEFAULT_ROLE, NewUser, StoreError},
    utils::{
        generate_token, hash_invitation_token, hash_password, success_to_api_response,
        verify_password,
    },
};

use super::model::{CreateTokenRequest, RegisterUserRequest, TokenResponse, UserWithToken};

/// 注册新用户，用户在激活之前不能登录
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    let password = req.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let plain_token = uuid::Uuid::new_v4().to_string();
    let token_hash = hash_invitation_token(&plain_token);

    let user = state
        .store
        .users
        .create_and_invite(
            NewUser {
                username: req.username.trim(),
                email: &req.email,
                password_hash: &password_hash,
                role: DEFAULT_ROLE,
            },
            &token_hash,
            state.config.invitation_expiration(),
        )
        .await?;

    let activation_url = format!("{}/confirm/{}", state.config.frontend_url, plain_token);
    tracing::info!(user_id = user.id, %activation_url, "user registered, waiting for activation");

    Ok((
        StatusCode::CREATED,
        success_to_api_response(UserWithToken {
            user,
            token: plain_token,
        }),
    ))
}

/// 用邮箱和密码换取 JWT
#[axum::debug_handler]
pub async fn create_token(
    State(state): State<AppState>,
    Json(req): Json<CreateTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    // 用户不存在和密码错误返回同样的结果
    let user = match state.store.users.get_by_email(&req.email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(AppError::Unauthorized),
        Err(e) => return Err(e.into()),
    };

    let password = req.password;
    let password_hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !valid {
        return Err(AppError::Unauthorized);
    }

    let (token, expires_at) = generate_token(user.id, &state.config)
        .map_err(|e| AppError::Internal(format!("生成令牌失败: {}", e)))?;

    Ok((
        StatusCode::CREATED,
        success_to_api_response(TokenResponse { token, expires_at }),
    ))
}
