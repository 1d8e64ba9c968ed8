use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    store::UserProfile,
    utils::{hash_invitation_token, success_to_api_response},
};

use super::model::{FeedParams, UpdateUserRequest};

/// 读取用户资料，经过读穿透缓存
#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.load_user(user_id).await?;
    Ok((StatusCode::OK, success_to_api_response(user)))
}

/// 通过邀请令牌激活用户
#[axum::debug_handler]
pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = state.store.users.activate(&hash_invitation_token(&token)).await?;
    // 缓存里可能还是未激活的旧资料
    state.invalidate_user(user_id).await?;

    tracing::info!(user_id, "user activated");
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn follow(
    Extension(me): Extension<UserProfile>,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if user_id == me.id {
        return Err(AppError::BadRequest("不能关注自己".to_string()));
    }

    state.store.users.follow(me.id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn unfollow(
    Extension(me): Extension<UserProfile>,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.store.users.unfollow(me.id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn update_me(
    Extension(me): Extension<UserProfile>,
    State(state): State<AppState>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    let user = state.store.users.update_username(me.id, req.username.trim()).await?;
    state.invalidate_user(me.id).await?;

    Ok((StatusCode::OK, success_to_api_response(user)))
}

#[axum::debug_handler]
pub async fn delete_me(
    Extension(me): Extension<UserProfile>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.store.users.delete(me.id).await?;
    state.invalidate_user(me.id).await?;

    tracing::info!(user_id = me.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// 自己和关注的人发的帖子
#[axum::debug_handler]
pub async fn get_feed(
    Extension(me): Extension<UserProfile>,
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params
        .into_query()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    let feed = state.store.posts.feed(me.id, &query).await?;
    Ok((StatusCode::OK, success_to_api_response(feed)))
}
