use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{AppState, error::AppError, utils::Claims};

/// 计算限流使用的客户端标识
///
/// 认证之后的请求按用户计数，否则按来源 IP：先看 `x-real-ip`，
/// 再看 `x-forwarded-for` 的第一个地址，最后使用连接地址。
pub fn client_key(req: &Request) -> String {
    if let Some(claims) = req.extensions().get::<Claims>() {
        return format!("user:{}", claims.sub);
    }

    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    let ip = req
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .filter(|ip| !ip.trim().is_empty())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim();

    format!("ip:{}", ip)
}

/// 固定窗口限流，超出配额时返回 429 和 `Retry-After`
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(limiter) = state.limiter.as_ref() else {
        return Ok(next.run(req).await);
    };

    let key = client_key(&req);
    let decision = limiter.allow(&key).await;

    if !decision.admitted {
        tracing::debug!(key = %key, retry_after = ?decision.retry_after, "request rejected by rate limiter");
        return Err(AppError::RateLimited(decision.retry_after));
    }

    Ok(next.run(req).await)
}
