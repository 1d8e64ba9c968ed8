use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{AppState, error::AppError, utils::verify_token};

/// 校验 Bearer 令牌，并把 `Claims` 和当前用户资料放进请求扩展
pub async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_token(bearer.token(), &state.config).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        AppError::Unauthorized
    })?;

    // 令牌有效但用户已被删除，同样视为未认证
    let user = match state.load_user(claims.sub).await {
        Ok(user) => user,
        Err(AppError::Cache(crate::cache::CacheError::NotFound))
        | Err(AppError::Store(crate::store::StoreError::NotFound)) => {
            return Err(AppError::Unauthorized);
        }
        Err(e) => return Err(e),
    };

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
