mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{StatusCode, header};
use social::cache::CacheError;
use social::clock::ManualClock;
use tower::ServiceExt;

use common::*;

fn fetch(uri: &str, as_user: i64, config: &social::config::Config) -> axum::http::Request<axum::body::Body> {
    empty(get(uri).header(header::AUTHORIZATION, bearer(as_user, config)))
}

#[tokio::test]
async fn test_profile_reads_are_served_from_cache() {
    let clock = Arc::new(ManualClock::new());
    let config = config();
    let db = MemoryDb::with_users(&[7, 8]);
    let app = app(config.clone(), &db, Some(user_cache(db.clone(), clock)), None);

    for _ in 0..3 {
        let response = app.clone().oneshot(fetch("/v1/users/8", 7, &config)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["resp_data"]["username"], "gopher8");
    }

    assert_eq!(db.fetches(8), 1);
    // 认证中间件读取当前用户也走缓存
    assert_eq!(db.fetches(7), 1);
}

#[tokio::test]
async fn test_entries_expire_after_ttl() {
    let clock = Arc::new(ManualClock::new());
    let config = config();
    let db = MemoryDb::with_users(&[7, 8]);
    let app = app(
        config.clone(),
        &db,
        Some(user_cache(db.clone(), clock.clone())),
        None,
    );

    app.clone().oneshot(fetch("/v1/users/8", 7, &config)).await.unwrap();
    db.upsert(profile(8, "renamed"));

    clock.advance(Duration::from_secs(300));
    let body = json_body(app.clone().oneshot(fetch("/v1/users/8", 7, &config)).await.unwrap()).await;
    assert_eq!(body["resp_data"]["username"], "gopher8");
    assert_eq!(db.fetches(8), 1);

    clock.advance(Duration::from_secs(1));
    let body = json_body(app.clone().oneshot(fetch("/v1/users/8", 7, &config)).await.unwrap()).await;
    assert_eq!(body["resp_data"]["username"], "renamed");
    assert_eq!(db.fetches(8), 2);
}

#[tokio::test]
async fn test_missing_users_are_not_cached() {
    let clock = Arc::new(ManualClock::new());
    let config = config();
    let db = MemoryDb::with_users(&[7]);
    let app = app(config.clone(), &db, Some(user_cache(db.clone(), clock)), None);

    let response = app.clone().oneshot(fetch("/v1/users/99", 7, &config)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], 1004);

    db.upsert(profile(99, "latecomer"));
    let response = app.clone().oneshot(fetch("/v1/users/99", 7, &config)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(db.fetches(99), 2);
}

#[tokio::test]
async fn test_unassigned_id_is_a_bad_request() {
    let clock = Arc::new(ManualClock::new());
    let config = config();
    let db = MemoryDb::with_users(&[7]);
    let app = app(config.clone(), &db, Some(user_cache(db.clone(), clock)), None);

    let response = app.clone().oneshot(fetch("/v1/users/0", 7, &config)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(db.fetches(0), 0);
}

#[tokio::test]
async fn test_invalidated_user_loses_access() {
    let clock = Arc::new(ManualClock::new());
    let config = config();
    let db = MemoryDb::with_users(&[7, 8]);
    let cache = user_cache(db.clone(), clock);
    let app = app(config.clone(), &db, Some(cache.clone()), None);

    let response = app.clone().oneshot(fetch("/v1/users/8", 7, &config)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 只改数据源时缓存仍然返回旧数据
    db.remove(7);
    let response = app.clone().oneshot(fetch("/v1/users/8", 7, &config)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    cache.invalidate(&7).await.unwrap();
    let response = app.clone().oneshot(fetch("/v1/users/8", 7, &config)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_concurrent_readers_see_write_after_invalidate() {
    let clock = Arc::new(ManualClock::new());
    let db = MemoryDb::with_users(&[8]);
    let cache = user_cache(db.clone(), clock);

    assert_eq!(cache.get(&8).await.unwrap().username, "gopher8");

    db.upsert(profile(8, "after-write"));
    cache.invalidate(&8).await.unwrap();

    let readers = (0..32).map(|_| {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get(&8).await })
    });
    for result in futures_util::future::join_all(readers).await {
        assert_eq!(result.unwrap().unwrap().username, "after-write");
    }

    // 并发回源可能有多次，但至少一次
    assert!(db.fetches(8) >= 2);
}

#[tokio::test]
async fn test_unknown_id_reports_not_found() {
    let clock = Arc::new(ManualClock::new());
    let db = MemoryDb::with_users(&[]);
    let cache = user_cache(db.clone(), clock);

    assert!(matches!(cache.get(&42).await, Err(CacheError::NotFound)));
    assert!(matches!(cache.get(&-1).await, Err(CacheError::InvalidKey(_))));
    assert_eq!(db.total_fetches(), 1);
}

#[tokio::test]
async fn test_username_change_is_visible_on_next_read() {
    let clock = Arc::new(ManualClock::new());
    let config = config();
    let db = MemoryDb::with_users(&[7]);
    let app = app(config.clone(), &db, Some(user_cache(db.clone(), clock)), None);

    let body = json_body(app.clone().oneshot(fetch("/v1/users/7", 7, &config)).await.unwrap()).await;
    assert_eq!(body["resp_data"]["username"], "gopher7");
    assert_eq!(db.fetches(7), 1);

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/v1/users/me",
            7,
            &config,
            serde_json::json!({ "username": "renamed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["resp_data"]["username"], "renamed");
    let before = db.fetches(7);

    let body = json_body(app.clone().oneshot(fetch("/v1/users/7", 7, &config)).await.unwrap()).await;
    assert_eq!(body["resp_data"]["username"], "renamed");
    // 失效后只回源一次，认证和处理器共用这次写回
    assert_eq!(db.fetches(7), before + 1);
}

#[tokio::test]
async fn test_deleted_user_is_not_served_from_cache() {
    let clock = Arc::new(ManualClock::new());
    let config = config();
    let db = MemoryDb::with_users(&[7, 8]);
    let app = app(config.clone(), &db, Some(user_cache(db.clone(), clock)), None);

    let response = app.clone().oneshot(fetch("/v1/users/7", 8, &config)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(authed("DELETE", "/v1/users/me", 7, &config)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(fetch("/v1/users/7", 8, &config)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.clone().oneshot(fetch("/v1/users/8", 7, &config)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_activation_refreshes_cached_profile() {
    let clock = Arc::new(ManualClock::new());
    let config = config();
    let db = MemoryDb::with_users(&[7]);
    db.upsert(social::store::UserProfile {
        is_active: false,
        ..profile(9, "pending")
    });
    db.invite(&social::utils::hash_invitation_token("welcome-token"), 9);
    let app = app(config.clone(), &db, Some(user_cache(db.clone(), clock)), None);

    let body = json_body(app.clone().oneshot(fetch("/v1/users/9", 7, &config)).await.unwrap()).await;
    assert_eq!(body["resp_data"]["is_active"], false);

    let response = app
        .clone()
        .oneshot(empty(
            axum::http::Request::builder()
                .method("PUT")
                .uri("/v1/users/activate/welcome-token"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = json_body(app.clone().oneshot(fetch("/v1/users/9", 7, &config)).await.unwrap()).await;
    assert_eq!(body["resp_data"]["is_active"], true);
    assert_eq!(db.fetches(9), 2);
}
