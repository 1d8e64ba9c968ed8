use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    store::{NewPost, Post, PostUpdate, UserProfile},
    utils::success_to_api_response,
};

use super::model::{CreateCommentRequest, CreatePostRequest, PostWithComments, UpdatePostRequest};

#[axum::debug_handler]
pub async fn create_post(
    Extension(me): Extension<UserProfile>,
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    let tags: Vec<String> = req.tags.iter().map(|t| t.trim().to_string()).collect();
    let post = state
        .store
        .posts
        .create(NewPost {
            user_id: me.id,
            title: req.title.trim(),
            content: req.content.trim(),
            tags: &tags,
        })
        .await?;

    tracing::info!(post_id = post.id, user_id = me.id, "post created");
    Ok((StatusCode::CREATED, success_to_api_response(post)))
}

/// 帖子由 `post_context` 中间件加载
#[axum::debug_handler]
pub async fn get_post(
    Extension(post): Extension<Post>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let comments = state.store.comments.list_by_post(post.id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(PostWithComments { post, comments }),
    ))
}

#[axum::debug_handler]
pub async fn update_post(
    Extension(post): Extension<Post>,
    State(state): State<AppState>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    let title = req.title.as_deref().map(str::trim).unwrap_or(&post.title);
    let content = req.content.as_deref().map(str::trim).unwrap_or(&post.content);
    let updated = state
        .store
        .posts
        .update(
            post.id,
            PostUpdate {
                title,
                content,
                version: req.version.unwrap_or(post.version),
            },
        )
        .await?;

    Ok((StatusCode::OK, success_to_api_response(updated)))
}

#[axum::debug_handler]
pub async fn delete_post(
    Extension(post): Extension<Post>,
    Extension(me): Extension<UserProfile>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.store.posts.delete(post.id).await?;

    tracing::info!(post_id = post.id, deleted_by = me.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn create_comment(
    Extension(post): Extension<Post>,
    Extension(me): Extension<UserProfile>,
    State(state): State<AppState>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    let comment = state
        .store
        .comments
        .create(post.id, me.id, req.content.trim())
        .await?;
    Ok((StatusCode::CREATED, success_to_api_response(comment)))
}

#[axum::debug_handler]
pub async fn list_comments(
    Extension(post): Extension<Post>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let comments = state.store.comments.list_by_post(post.id).await?;
    Ok((StatusCode::OK, success_to_api_response(comments)))
}
