use std::net::{IpAddr, SocketAddr};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use expert_backend::{
    AppState,
    config::Config,
    middleware::{auth_middleware, log_errors},
    routes,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;

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

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let state = AppState {
        pool,
        config: config.clone(),
    };

    // 公开路由：浏览和搜索无需登录
    let public_routes = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .route("/experts", get(routes::expert::list_experts))
        .route("/experts/{id}", get(routes::expert::get_expert))
        .route("/certificates", get(routes::certificate::list_certificates))
        .route("/certificates/{id}", get(routes::certificate::get_certificate));

    // 受保护路由：所有写操作都要求携带有效令牌
    let protected_routes = Router::new()
        .route("/experts", post(routes::expert::create_expert))
        .route("/experts/{id}", put(routes::expert::update_expert))
        .route("/experts/{id}", delete(routes::expert::delete_expert))
        .route("/experts/import", post(routes::expert::import_experts))
        .route("/certificates", post(routes::certificate::create_certificate))
        .route("/certificates/{id}", put(routes::certificate::update_certificate))
        .route(
            "/certificates/{id}",
            delete(routes::certificate::delete_certificate),
        )
        .route("/upload", post(routes::upload::upload_file))
        .route("/users", get(routes::user::list_users))
        .route("/users", post(routes::user::create_user))
        .route("/users/{id}", get(routes::user::get_user))
        .route("/users/{id}", put(routes::user::update_user))
        .route("/users/{id}", delete(routes::user::delete_user))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // multipart上传留出比5MB校验上限更高的请求体空间
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024));

    // 上传文件从公开路径直接读取
    let router = Router::new()
        .nest(&config.api_base_uri.clone(), api_routes)
        .nest_service("/uploads", ServeDir::new(&config.upload_dir));

    // 添加日志中间件
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
