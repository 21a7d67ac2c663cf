use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lifelink::{
    build_router,
    config::Config,
    services::{Database, DonorService, MessageService, NotificationService, RequestService},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "lifelink=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting LifeLink service...");

    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    if !config.is_production() {
        info!("Running in {} mode", config.environment);
    }

    // 初始化数据库连接
    let db = Arc::new(match Database::new(&config).await {
        Ok(db) => match db.verify_connection().await {
            Ok(_) => {
                info!("Database connection established successfully");
                db
            }
            Err(e) => {
                warn!("Database connection failed: {}", e);
                info!("Attempting to auto-start database...");

                // 尝试自动启动数据库
                if let Err(start_err) = auto_start_database(&config).await {
                    error!(
                        "Failed to auto-start database: {}. Original error: {}",
                        start_err, e
                    );
                    return Err(anyhow::anyhow!("Database connection failed"));
                }

                // 重新尝试连接
                let db = Database::new(&config).await?;
                db.verify_connection().await?;
                info!("Database auto-started and connected successfully");
                db
            }
        },
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(anyhow::anyhow!("Database initialization failed"));
        }
    });
    db.define_schema().await?;

    // 初始化所有服务
    let notification_service = NotificationService::new(&config)?;
    let donor_service = DonorService::new(db.clone()).await?;
    let message_service = MessageService::new(db.clone()).await?;
    let request_service = RequestService::new(
        db.clone(),
        donor_service.clone(),
        notification_service.clone(),
        message_service.clone(),
    )
    .await?;

    // 创建应用状态
    let app_state = Arc::new(AppState {
        config: config.clone(),
        db,
        donor_service,
        request_service,
        notification_service,
        message_service,
    });

    // 启动后台任务
    start_background_tasks(app_state.clone()).await;

    let app = build_router(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn auto_start_database(config: &Config) -> anyhow::Result<()> {
    info!("Attempting to start SurrealDB...");

    // 尝试启动 SurrealDB 进程
    let output = tokio::process::Command::new("surreal")
        .args([
            "start",
            "--user",
            &config.database_username,
            "--pass",
            &config.database_password,
            "memory",
        ])
        .spawn();

    match output {
        Ok(_) => {
            info!("SurrealDB started successfully");
            // 等待数据库启动
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(())
        }
        Err(e) => {
            error!("Failed to start SurrealDB: {}", e);
            Err(anyhow::anyhow!("Failed to start database"))
        }
    }
}

async fn start_background_tasks(app_state: Arc<AppState>) {
    info!("Starting background tasks...");

    // 定期输出待处理请求摘要，便于血库后台盯盘
    let digest_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(
            digest_state.config.pending_digest_interval,
        ));

        loop {
            interval.tick().await;
            match digest_state.request_service.count_open().await {
                Ok(open) => info!("{} blood request(s) currently pending", open),
                Err(e) => error!("Failed to count pending requests: {}", e),
            }
        }
    });

    info!("Background tasks started successfully");
}
