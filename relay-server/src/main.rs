use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use protocol::{Listener, TcpListener, DEFAULT_PORT};
use relay_server::RelayServer;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("relay_server=debug".parse()?))
        .init();

    // 端口：命令行参数 > RELAY_PORT 环境变量 > 默认端口
    let port: u16 = match std::env::args().nth(1).or_else(|| std::env::var("RELAY_PORT").ok()) {
        Some(port) => port.parse().with_context(|| format!("无效的端口: {port}"))?,
        None => DEFAULT_PORT,
    };

    info!("水晶棋中继服务端启动中...");
    let listener = TcpListener::bind(&format!("0.0.0.0:{port}")).await?;
    let server = RelayServer::new();

    tokio::select! {
        result = server.run(listener) => result?,
        _ = tokio::signal::ctrl_c() => info!("收到退出信号，中继服务端关闭"),
    }

    Ok(())
}
