//! 服务器主逻辑
//!
//! 把连接事件（绑定身份、排队、走棋、认输、断线）分派给匹配队列与对局注册表，
//! 对局结束时通过积分存储结算。

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use protocol::{
    ChessError, ClientMessage, ErrorCode, GameId, Identity, MoveHint, PlayerId, Position,
    ServerMessage, Side, RATING_DELTA,
};

use crate::matchmaking::MatchmakingQueue;
use crate::player::{DirectoryError, PlayerDirectory, PlayerStatus};
use crate::rating::{MemoryRatingStore, RatingStore};
use crate::registry::SessionRegistry;

/// 服务器状态
pub struct ServerState {
    pub players: PlayerDirectory,
    pub queue: MatchmakingQueue,
    pub sessions: SessionRegistry,
    pub ratings: Box<dyn RatingStore>,
    /// 玩家 ID -> 消息发送通道
    pub connections: HashMap<PlayerId, mpsc::Sender<ServerMessage>>,
}

impl ServerState {
    pub fn new(ratings: Box<dyn RatingStore>) -> Self {
        Self {
            players: PlayerDirectory::new(),
            queue: MatchmakingQueue::new(),
            sessions: SessionRegistry::new(),
            ratings,
            connections: HashMap::new(),
        }
    }

    /// 发送消息给玩家
    ///
    /// 在持锁期间调用，不能等待。发送缓冲区已满时移除该玩家的发送端，
    /// 之后的消息直接丢弃，由连接自身的超时或断线流程收尾。
    pub fn send_to_player(&mut self, player_id: PlayerId, msg: ServerMessage) {
        let Some(tx) = self.connections.get(&player_id) else {
            return;
        };
        match tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(player_id, "发送缓冲区已满，停止向该连接推送");
                self.connections.remove(&player_id);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(player_id, "发送通道已关闭");
            }
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(Box::new(MemoryRatingStore::new()))
    }
}

/// 待发送的消息
///
/// 接收方在入队时确定，对局被移除后仍能送达。
struct PendingMessages {
    messages: Vec<(PlayerId, ServerMessage)>,
}

impl PendingMessages {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    fn send(&mut self, player_id: PlayerId, msg: ServerMessage) {
        self.messages.push((player_id, msg));
    }

    /// 发给对局双方
    fn send_both(&mut self, players: [PlayerId; 2], msg: ServerMessage) {
        let [white, black] = players;
        self.messages.push((white, msg.clone()));
        self.messages.push((black, msg));
    }

    fn flush(self, state: &mut ServerState) {
        for (player_id, msg) in self.messages {
            state.send_to_player(player_id, msg);
        }
    }
}

fn error_reply(code: ErrorCode, message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        code,
        message: message.into(),
    }
}

fn chess_error_reply(err: &ChessError) -> ServerMessage {
    error_reply(ErrorCode::from(err), err.to_string())
}

fn game_not_found(game_id: GameId) -> ServerMessage {
    error_reply(ErrorCode::GameNotFound, format!("对局 {} 不存在", game_id))
}

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 绑定连接与身份
    pub fn connect(
        state: &mut ServerState,
        identity: Identity,
        tx: mpsc::Sender<ServerMessage>,
    ) -> ServerMessage {
        let player_id = identity.id;
        match state.players.connect(identity) {
            Ok(()) => {
                state.connections.insert(player_id, tx);
                info!(player_id, online = state.players.online_count(), "玩家已连接");
                ServerMessage::Welcome { player_id }
            }
            Err(e) => {
                warn!(player_id, error = %e, "身份绑定失败");
                let code = match e {
                    DirectoryError::AlreadyConnected => ErrorCode::AlreadyConnected,
                    DirectoryError::EmptyDisplayName | DirectoryError::DisplayNameTooLong(_) => {
                        ErrorCode::InvalidDisplayName
                    }
                };
                error_reply(code, e.to_string())
            }
        }
    }

    /// 处理已绑定身份的客户端消息
    pub fn handle(
        state: &mut ServerState,
        player_id: PlayerId,
        msg: ClientMessage,
    ) -> Option<ServerMessage> {
        let mut pending = PendingMessages::new();

        let result = match msg {
            ClientMessage::Hello { .. } => Some(error_reply(
                ErrorCode::AlreadyConnected,
                "连接已绑定身份",
            )),
            ClientMessage::JoinQueue => Self::handle_join_queue(state, &mut pending, player_id),
            ClientMessage::LeaveQueue => Self::handle_leave_queue(state, player_id),
            ClientMessage::MakeMove {
                game_id,
                from,
                to,
                hint,
            } => Self::handle_make_move(state, &mut pending, player_id, game_id, from, to, hint),
            ClientMessage::Resign { game_id } => {
                Self::handle_resign(state, &mut pending, player_id, game_id)
            }
            ClientMessage::LegalMoves { game_id, from } => {
                Self::handle_legal_moves(state, player_id, game_id, from)
            }
            ClientMessage::Ping => Some(ServerMessage::Pong),
        };

        // 发送待发送的消息
        pending.flush(state);

        result
    }

    /// 处理加入队列
    fn handle_join_queue(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
    ) -> Option<ServerMessage> {
        let identity = match state.players.get(player_id) {
            None => return Some(error_reply(ErrorCode::NotAuthenticated, "尚未绑定身份")),
            Some(player) => match player.status {
                PlayerStatus::InGame(game_id) => {
                    return Some(error_reply(
                        ErrorCode::AlreadyInGame,
                        format!("已在对局 {} 中", game_id),
                    ));
                }
                PlayerStatus::Lobby | PlayerStatus::Queued(_) => player.identity.clone(),
            },
        };

        let ticket = state.queue.join(identity);
        state.players.set_status(player_id, PlayerStatus::Queued(ticket));

        let waiting = state.queue.len();
        info!(player_id, waiting, "加入匹配队列");

        // 先回复入队，再推送可能的配对结果
        pending.send(player_id, ServerMessage::QueueJoined { waiting });
        Self::try_pair(state, pending);

        None
    }

    /// 处理离开队列
    fn handle_leave_queue(state: &mut ServerState, player_id: PlayerId) -> Option<ServerMessage> {
        if Self::cancel_queued(state, player_id) {
            state.players.set_status(player_id, PlayerStatus::Lobby);
            info!(player_id, waiting = state.queue.len(), "离开匹配队列");
        }
        Some(ServerMessage::QueueLeft)
    }

    /// 按玩家持有的凭证撤出队列
    fn cancel_queued(state: &mut ServerState, player_id: PlayerId) -> bool {
        match state.players.status(player_id) {
            Some(PlayerStatus::Queued(ticket)) => state.queue.cancel(ticket).is_some(),
            _ => false,
        }
    }

    /// 队列中有两人及以上时配对
    fn try_pair(state: &mut ServerState, pending: &mut PendingMessages) {
        while let Some((white, black)) = state.queue.pop_pair() {
            let white_id = white.identity.id;
            let black_id = black.identity.id;

            let game_id = match state
                .sessions
                .create(white.identity.clone(), black.identity.clone())
            {
                Ok(id) => id,
                Err(e) => {
                    error!(white = white_id, black = black_id, error = %e, "创建对局失败");
                    for id in [white_id, black_id] {
                        state.players.set_status(id, PlayerStatus::Lobby);
                        pending.send(id, error_reply(ErrorCode::InternalError, e.to_string()));
                    }
                    continue;
                }
            };

            let board = match state.sessions.get(game_id) {
                Some(session) => session.state().board,
                None => continue,
            };

            state.players.set_status(white_id, PlayerStatus::InGame(game_id));
            state.players.set_status(black_id, PlayerStatus::InGame(game_id));

            pending.send(
                white_id,
                ServerMessage::GameFound {
                    game_id,
                    your_side: Side::White,
                    opponent: black.identity.clone(),
                    board,
                },
            );
            pending.send(
                black_id,
                ServerMessage::GameFound {
                    game_id,
                    your_side: Side::Black,
                    opponent: white.identity.clone(),
                    board,
                },
            );

            let waited_ms = (Utc::now() - white.queued_at).num_milliseconds();
            info!(game_id, white = white_id, black = black_id, waited_ms, "配对成功");
        }
    }

    /// 处理走棋
    fn handle_make_move(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        game_id: GameId,
        from: Position,
        to: Position,
        hint: Option<MoveHint>,
    ) -> Option<ServerMessage> {
        let session = match state.sessions.get_mut(game_id) {
            Some(s) => s,
            None => return Some(game_not_found(game_id)),
        };

        match session.apply_move(player_id, from, to, hint) {
            Ok(snapshot) => {
                let players = session.player_ids();
                let over = snapshot.status.is_over();

                pending.send_both(players, ServerMessage::GameState { game_id, snapshot });

                if over {
                    Self::finish_game(state, pending, game_id);
                }
                None
            }
            Err(e) => {
                warn!(game_id, player_id, %from, %to, error = %e, "走法被拒绝");
                Some(chess_error_reply(&e))
            }
        }
    }

    /// 处理认输
    fn handle_resign(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        game_id: GameId,
    ) -> Option<ServerMessage> {
        let result = match state.sessions.get_mut(game_id) {
            Some(session) => session.resign(player_id),
            None => return Some(game_not_found(game_id)),
        };

        match result {
            Ok(_) => {
                info!(game_id, player_id, "玩家认输");
                Self::finish_game(state, pending, game_id);
                None
            }
            Err(e) => {
                warn!(game_id, player_id, error = %e, "认输被拒绝");
                Some(chess_error_reply(&e))
            }
        }
    }

    /// 处理合法走法查询
    fn handle_legal_moves(
        state: &ServerState,
        player_id: PlayerId,
        game_id: GameId,
        from: Position,
    ) -> Option<ServerMessage> {
        let session = match state.sessions.get(game_id) {
            Some(s) => s,
            None => return Some(game_not_found(game_id)),
        };

        match session.legal_moves_for(player_id, from) {
            Ok(moves) => Some(ServerMessage::LegalMoves { from, moves }),
            Err(e) => Some(chess_error_reply(&e)),
        }
    }

    /// 结算并移除已终局的对局
    fn finish_game(state: &mut ServerState, pending: &mut PendingMessages, game_id: GameId) {
        let outcome = match state.sessions.get(game_id).and_then(|s| s.outcome()) {
            Some(outcome) => outcome,
            None => return,
        };
        let session = match state.sessions.remove(game_id) {
            Some(s) => s,
            None => return,
        };

        pending.send_both(
            session.player_ids(),
            ServerMessage::GameOver {
                game_id,
                winner: outcome.winner,
                reason: outcome.reason,
            },
        );

        // 逼和不结算
        if let Some(winner) = outcome.winner {
            let winner_id = session.player(winner).id;
            let loser_id = session.player(winner.opponent()).id;

            for (user_id, delta) in [(winner_id, RATING_DELTA), (loser_id, -RATING_DELTA)] {
                match state.ratings.adjust_rating(user_id, delta) {
                    Ok(rating) => info!(user_id, delta, rating, "积分已调整"),
                    Err(e) => error!(user_id, delta, error = ?e, "积分调整失败"),
                }
            }
        }

        for player_id in session.player_ids() {
            state.players.set_status(player_id, PlayerStatus::Lobby);
        }

        let duration_secs = (Utc::now() - session.started_at).num_seconds();
        info!(
            game_id,
            status = ?outcome.status,
            winner = ?outcome.winner,
            plies = session.history().len(),
            duration_secs,
            "对局结束"
        );
    }

    /// 处理玩家断线
    ///
    /// 排队中的移出队列；对局中的直接判负，不保留重连窗口。
    pub fn handle_disconnect(state: &mut ServerState, player_id: PlayerId) {
        let mut pending = PendingMessages::new();

        if Self::cancel_queued(state, player_id) {
            info!(player_id, "断线，已移出匹配队列");
        }

        if let Some(game_id) = state.sessions.find_by_player(player_id) {
            let result = state
                .sessions
                .get_mut(game_id)
                .map(|session| session.disconnect(player_id));

            match result {
                Some(Ok(_)) => {
                    info!(game_id, player_id, "对局中断线，判负");
                    Self::finish_game(state, &mut pending, game_id);
                }
                Some(Err(e)) => warn!(game_id, player_id, error = %e, "断线处理失败"),
                None => {}
            }
        }

        state.players.disconnect(player_id);
        state.connections.remove(&player_id);
        info!(player_id, online = state.players.online_count(), "玩家已断开");

        // 发送待发送的消息
        pending.flush(state);
    }
}
