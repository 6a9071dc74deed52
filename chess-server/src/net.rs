//! TCP 前端
//!
//! 每个连接一个读任务、一个写任务；所有状态修改经过同一把锁。

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use protocol::{
    ClientMessage, Connection, ErrorCode, Identity, Listener, PlayerId, ProtocolError,
    ServerMessage, TcpConnection, TcpListener,
};

use crate::config::ServerConfig;
use crate::server::{MessageHandler, ServerState};

/// 共享服务器状态
pub type SharedState = Arc<Mutex<ServerState>>;

/// 绑定地址并运行接受循环
pub async fn run(config: ServerConfig, state: SharedState) -> Result<()> {
    let listener = TcpListener::bind(&config.network.bind_addr())
        .await
        .with_context(|| format!("无法监听 {}", config.network.bind_addr()))?;

    serve(listener, config, state).await
}

/// 在已绑定的监听器上接受连接
pub async fn serve(mut listener: TcpListener, config: ServerConfig, state: SharedState) -> Result<()> {
    info!(addr = ?listener.local_addr(), "服务端已启动");

    loop {
        match listener.accept().await {
            Ok(conn) => {
                tokio::spawn(serve_connection(conn, state.clone(), config.clone()));
            }
            Err(e) => warn!(error = %e, "接受连接失败"),
        }
    }
}

/// 处理单个连接直到断开
async fn serve_connection(conn: TcpConnection, state: SharedState, config: ServerConfig) {
    let peer = conn.peer_addr().unwrap_or_default();
    let (mut reader, mut writer) = conn.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(config.outbound_buffer);

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = writer.write_frame(&msg).await {
                debug!(error = %e, "写入失败");
                break;
            }
        }
    });

    let mut player_id: Option<PlayerId> = None;

    loop {
        let msg: ClientMessage = match timeout(config.heartbeat_timeout, reader.read_frame()).await {
            Ok(Ok(msg)) => msg,
            Ok(Err(ProtocolError::ConnectionClosed)) => {
                debug!(%peer, "连接已关闭");
                break;
            }
            Ok(Err(e)) => {
                warn!(%peer, error = %e, "读取消息失败");
                break;
            }
            Err(_) => {
                info!(%peer, ?player_id, "心跳超时");
                break;
            }
        };

        let reply = {
            let mut state = state.lock().await;
            match (player_id, msg) {
                (None, ClientMessage::Hello { user_id, display_name }) => {
                    let reply = MessageHandler::connect(
                        &mut state,
                        Identity::new(user_id, display_name),
                        tx.clone(),
                    );
                    if matches!(reply, ServerMessage::Welcome { .. }) {
                        player_id = Some(user_id);
                    }
                    Some(reply)
                }
                (None, ClientMessage::Ping) => Some(ServerMessage::Pong),
                (None, _) => Some(ServerMessage::Error {
                    code: ErrorCode::NotAuthenticated,
                    message: "请先发送 Hello 绑定身份".to_string(),
                }),
                (Some(id), msg) => MessageHandler::handle(&mut state, id, msg),
            }
        };

        // 缓冲区满说明对端长时间未读取，按断线处理
        if let Some(reply) = reply {
            if let Err(e) = tx.try_send(reply) {
                info!(%peer, ?player_id, error = %e, "无法回复，关闭连接");
                break;
            }
        }
    }

    if let Some(id) = player_id {
        let mut state = state.lock().await;
        MessageHandler::handle_disconnect(&mut state, id);
    }

    // 状态中保存的发送端已移除，这里释放最后一个
    drop(tx);
    let _ = writer_task.await;
}
