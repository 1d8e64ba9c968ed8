use axum::{
    Router,
    handler::Handler,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
};

use crate::{
    AppState,
    middleware::{
        PostPermission, auth, check_post_ownership, log_errors, post_context, rate_limit,
    },
    routes,
    store::{ADMIN_ROLE, MODERATOR_ROLE},
};

/// 组装全部路由，挂载在 `api_base_uri` 下
pub fn create_router(state: AppState) -> Router {
    // 公开路由按来源 IP 限流
    let public_routes = Router::new()
        .route("/health", get(routes::health::health))
        .route("/authentication/user", post(routes::auth::register))
        .route("/authentication/token", post(routes::auth::create_token))
        .route("/users/activate/{token}", put(routes::user::activate))
        .layer(from_fn_with_state(state.clone(), rate_limit));

    // 作者本人之外，修改需要 moderator，删除需要 admin
    let moderator = from_fn_with_state(
        PostPermission::new(state.clone(), MODERATOR_ROLE),
        check_post_ownership,
    );
    let admin = from_fn_with_state(
        PostPermission::new(state.clone(), ADMIN_ROLE),
        check_post_ownership,
    );

    let post_routes = Router::new()
        .route(
            "/posts/{id}",
            get(routes::post::get_post)
                .patch(routes::post::update_post.layer(moderator))
                .delete(routes::post::delete_post.layer(admin)),
        )
        .route(
            "/posts/{id}/comments",
            get(routes::post::list_comments).post(routes::post::create_comment),
        )
        .route_layer(from_fn_with_state(state.clone(), post_context));

    // 受保护路由：先按 IP 限流（未认证的请求也计数），再认证，再按用户限流
    let protected_routes = Router::new()
        .route("/users/feed", get(routes::user::get_feed))
        .route("/users/{id}", get(routes::user::get_user))
        .route("/users/{id}/follow", put(routes::user::follow))
        .route("/users/{id}/unfollow", put(routes::user::unfollow))
        .route(
            "/users/me",
            patch(routes::user::update_me).delete(routes::user::delete_me),
        )
        .route("/posts", post(routes::post::create_post))
        .merge(post_routes)
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn_with_state(state.clone(), auth))
        .layer(from_fn_with_state(state.clone(), rate_limit));

    let api = Router::new().merge(public_routes).merge(protected_routes);
    let base = state.config.api_base_uri.trim_end_matches('/');
    // axum 不允许在根路径 nest
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    router.layer(from_fn(log_errors)).with_state(state)
}
