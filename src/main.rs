use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use social::{
    AppState, UserCache,
    cache::{CacheStore, MemoryCacheStore, RedisCacheStore},
    config::{Config, RateLimitBackend},
    ratelimit::{AdmissionControl, FixedWindowLimiter, RedisRateLimiter},
    router::create_router,
    store::{Storage, UserProfile, UserStore},
    sweep::SweeperHandle,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 后台清理过期计数和缓存条目的间隔
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'gopher_social';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    // 用户存储库同时是用户缓存的数据源
    let users = Arc::new(UserStore::new(pool.clone(), config.query_timeout()));
    let store = Storage::postgres(users.clone(), pool, config.query_timeout());

    // Redis 只在开启时创建，缓存和分布式限流共用一个客户端
    let redis = config.redis_enabled.then(|| {
        Arc::new(redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client"))
    });

    // 后台清理任务的句柄必须一直持有，drop 时任务会被取消
    let mut sweepers: Vec<SweeperHandle> = Vec::new();

    let user_cache = if config.cache_enabled {
        let cache_store: Arc<dyn CacheStore<i64, UserProfile>> = match &redis {
            Some(redis) => {
                tracing::info!("user cache backed by redis");
                Arc::new(RedisCacheStore::<UserProfile>::users(redis.clone()))
            }
            None => {
                tracing::info!("user cache kept in process memory");
                let memory = Arc::new(MemoryCacheStore::<i64, UserProfile>::new());
                sweepers.push(memory.spawn_purger(SWEEP_INTERVAL));
                memory
            }
        };
        let cache = UserCache::new(cache_store, users, config.user_cache())
            .expect("Invalid cache configuration");
        Some(Arc::new(cache))
    } else {
        tracing::info!("user cache disabled");
        None
    };

    let limiter: Option<Arc<dyn AdmissionControl>> = if config.rate_limit_enabled {
        match (config.rate_limit_backend, &redis) {
            (RateLimitBackend::Redis, Some(redis)) => {
                tracing::info!("rate limiter backed by redis");
                let shared: Arc<dyn AdmissionControl> = Arc::new(
                    RedisRateLimiter::new(redis.clone(), config.rate_limiter())
                        .expect("Invalid rate limit configuration"),
                );
                Some(shared)
            }
            (backend, _) => {
                if backend == RateLimitBackend::Redis {
                    tracing::warn!("RATE_LIMIT_BACKEND=redis but redis is disabled, using memory");
                }
                let local = Arc::new(
                    FixedWindowLimiter::new(config.rate_limiter())
                        .expect("Invalid rate limit configuration"),
                );
                sweepers.push(local.spawn_sweeper(SWEEP_INTERVAL));
                let local: Arc<dyn AdmissionControl> = local;
                Some(local)
            }
        }
    } else {
        tracing::info!("rate limiting disabled");
        None
    };

    // 设置应用状态
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        user_cache,
        limiter,
    };

    let router = create_router(state);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    drop(sweepers);
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
