use fulfillment_server::{AppState, BackgroundTasks, Config, print_banner, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 设置环境 (dotenv, 日志)
    setup_environment();

    // 打印横幅
    print_banner();

    tracing::info!("BlisterPost Fulfillment Server starting...");

    // 2. 加载配置
    let config = Config::from_env();

    // 3. 初始化服务状态
    let (state, notification_worker) = AppState::initialize(&config).await?;

    // 4. 启动后台任务（调度循环 + 通知工作者）
    let mut tasks = BackgroundTasks::new();
    state.start_background_tasks(&mut tasks, notification_worker);

    // 5. 启动 HTTP 运维接口
    let router = fulfillment_server::api::router(state);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("HTTP API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // 6. Graceful shutdown - 等待后台任务退出
    tasks.shutdown().await;

    Ok(())
}
