use axum::{
    extract::{Extension, Path, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    error::AppError,
    store::{Post, UserProfile},
};

/// 按路径里的帖子ID加载帖子，放进请求扩展
///
/// 需要用 `route_layer` 挂载，路由匹配之后才有路径参数。
pub async fn post_context(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let post = state.store.posts.get_by_id(post_id).await?;
    req.extensions_mut().insert(post);
    Ok(next.run(req).await)
}

/// 修改别人帖子所需的最低角色
#[derive(Clone)]
pub struct PostPermission {
    pub state: AppState,
    pub required_role: &'static str,
}

impl PostPermission {
    pub fn new(state: AppState, required_role: &'static str) -> Self {
        Self {
            state,
            required_role,
        }
    }
}

/// 作者本人直接放行，其他人的角色等级不能低于要求的角色
pub async fn check_post_ownership(
    State(permission): State<PostPermission>,
    Extension(me): Extension<UserProfile>,
    Extension(post): Extension<Post>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if post.user_id == me.id {
        return Ok(next.run(req).await);
    }

    let role = permission
        .state
        .store
        .roles
        .get_by_name(permission.required_role)
        .await?;
    if me.role_level < role.level {
        tracing::debug!(
            user_id = me.id,
            post_id = post.id,
            required = permission.required_role,
            "post access denied"
        );
        return Err(AppError::Forbidden);
    }

    Ok(next.run(req).await)
}
