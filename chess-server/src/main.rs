use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chess_server::{net, rating, ServerConfig, ServerState};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("chess_server=debug".parse()?)
            .add_directive("protocol=info".parse()?))
        .init();

    info!("国际象棋裁判服务启动中...");

    let config = ServerConfig::from_env()?;
    let ratings = rating::open_rating_store(&config)?;
    let state = Arc::new(Mutex::new(ServerState::new(ratings)));

    net::run(config, state).await
}
