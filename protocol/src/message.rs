//! 消息类型定义

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::ChessError;
use crate::moves::{Move, MoveHint};
use crate::piece::{Piece, Position, Side};

/// 玩家 ID（由外部认证服务签发的稳定用户 ID）
pub type PlayerId = u64;

/// 对局 ID
pub type GameId = u64;

/// 已认证的玩家身份
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: PlayerId,
    pub display_name: String,
}

impl Identity {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// 对局生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// 进行中
    Active,
    /// 将死
    Checkmate,
    /// 逼和
    Stalemate,
    /// 认输
    Resigned,
    /// 断线
    Disconnected,
}

impl GameStatus {
    /// 是否为终局状态
    pub fn is_over(&self) -> bool {
        !matches!(self, GameStatus::Active)
    }
}

/// 终局原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverReason {
    Checkmate,
    Stalemate,
    Resignation,
    /// 对手离开
    OpponentLeft,
}

impl GameOverReason {
    /// 从终局状态推导原因
    pub fn from_status(status: GameStatus) -> Option<Self> {
        match status {
            GameStatus::Active => None,
            GameStatus::Checkmate => Some(GameOverReason::Checkmate),
            GameStatus::Stalemate => Some(GameOverReason::Stalemate),
            GameStatus::Resigned => Some(GameOverReason::Resignation),
            GameStatus::Disconnected => Some(GameOverReason::OpponentLeft),
        }
    }
}

/// 双方吃掉的棋子
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captures {
    /// 白方吃掉的（黑色）棋子
    pub by_white: Vec<Piece>,
    /// 黑方吃掉的（白色）棋子
    pub by_black: Vec<Piece>,
}

impl Captures {
    /// 记录 `side` 吃掉的棋子
    pub fn record(&mut self, side: Side, piece: Piece) {
        match side {
            Side::White => self.by_white.push(piece),
            Side::Black => self.by_black.push(piece),
        }
    }
}

/// 对局公开状态（每步棋后推送给双方）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub board: Board,
    pub turn: Side,
    pub last_move: Option<Move>,
    /// 被将军的一方
    pub check: Option<Side>,
    pub status: GameStatus,
    pub winner: Option<Side>,
    pub captures: Captures,
}

/// 客户端发送给服务端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    // === 身份 ===
    /// 绑定已认证的身份（不做凭证校验）
    Hello {
        user_id: PlayerId,
        display_name: String,
    },

    // === 匹配 ===
    /// 加入匹配队列
    JoinQueue,
    /// 离开匹配队列
    LeaveQueue,

    // === 对局 ===
    /// 走棋
    MakeMove {
        game_id: GameId,
        from: Position,
        to: Position,
        hint: Option<MoveHint>,
    },
    /// 认输
    Resign { game_id: GameId },
    /// 查询某格棋子的合法走法（用于客户端高亮）
    LegalMoves { game_id: GameId, from: Position },

    // === 心跳 ===
    Ping,
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    // === 身份 ===
    /// 身份绑定成功
    Welcome { player_id: PlayerId },

    // === 匹配 ===
    /// 已进入队列，`waiting` 为当前排队人数
    QueueJoined { waiting: usize },
    /// 已离开队列
    QueueLeft,
    /// 匹配成功
    GameFound {
        game_id: GameId,
        your_side: Side,
        opponent: Identity,
        board: Board,
    },

    // === 对局 ===
    /// 走棋后的对局状态
    GameState { game_id: GameId, snapshot: GameSnapshot },
    /// 对局结束
    GameOver {
        game_id: GameId,
        winner: Option<Side>,
        reason: GameOverReason,
    },
    /// 合法走法查询结果
    LegalMoves { from: Position, moves: Vec<Move> },

    // === 心跳 ===
    Pong,

    // === 错误 ===
    /// 只发给出错的一方
    Error { code: ErrorCode, message: String },
}

/// 错误码定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // === 身份相关 (1xx) ===
    /// 尚未绑定身份
    NotAuthenticated = 100,
    /// 同一身份已有连接
    AlreadyConnected = 101,
    /// 无效显示名
    InvalidDisplayName = 102,

    // === 匹配相关 (2xx) ===
    /// 已在对局中
    AlreadyInGame = 200,

    // === 对局相关 (3xx) ===
    /// 对局不存在
    GameNotFound = 300,
    /// 不是该对局的参与者
    NotAParticipant = 301,
    /// 不是你的回合
    NotYourTurn = 302,
    /// 无效走法
    InvalidMove = 303,
    /// 对局已结束
    GameAlreadyOver = 304,

    // === 系统相关 (5xx) ===
    /// 内部错误
    InternalError = 500,
}

impl From<&ChessError> for ErrorCode {
    fn from(err: &ChessError) -> Self {
        match err {
            ChessError::NotYourTurn | ChessError::NotYourPiece(_) => ErrorCode::NotYourTurn,
            ChessError::NotAParticipant => ErrorCode::NotAParticipant,
            ChessError::GameOver => ErrorCode::GameAlreadyOver,
            ChessError::NoPiece(_)
            | ChessError::IllegalMove { .. }
            | ChessError::InvalidSquare(_) => ErrorCode::InvalidMove,
            ChessError::InvalidFen { .. } => ErrorCode::InternalError,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::CastleSide;

    #[test]
    fn test_move_message_serialize() {
        let msg = ClientMessage::MakeMove {
            game_id: 7,
            from: "e1".parse().unwrap(),
            to: "g1".parse().unwrap(),
            hint: Some(MoveHint {
                castling: Some(CastleSide::Kingside),
                en_passant: false,
            }),
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let decoded: ClientMessage = bincode::deserialize(&bytes).unwrap();

        match decoded {
            ClientMessage::MakeMove { game_id, to, hint, .. } => {
                assert_eq!(game_id, 7);
                assert_eq!(to.to_string(), "g1");
                assert_eq!(hint.and_then(|h| h.castling), Some(CastleSide::Kingside));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_game_found_serialize() {
        let msg = ServerMessage::GameFound {
            game_id: 1,
            your_side: Side::Black,
            opponent: Identity::new(42, "alice"),
            board: Board::initial(),
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let decoded: ServerMessage = bincode::deserialize(&bytes).unwrap();

        match decoded {
            ServerMessage::GameFound { your_side, opponent, board, .. } => {
                assert_eq!(your_side, Side::Black);
                assert_eq!(opponent.display_name, "alice");
                assert_eq!(board, Board::initial());
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(ErrorCode::from(&ChessError::NotYourTurn), ErrorCode::NotYourTurn);
        assert_eq!(ErrorCode::from(&ChessError::GameOver), ErrorCode::GameAlreadyOver);
        assert_eq!(
            ErrorCode::from(&ChessError::NoPiece("e4".parse().unwrap())),
            ErrorCode::InvalidMove
        );
    }

    #[test]
    fn test_reason_from_status() {
        assert_eq!(GameOverReason::from_status(GameStatus::Active), None);
        assert_eq!(
            GameOverReason::from_status(GameStatus::Disconnected),
            Some(GameOverReason::OpponentLeft)
        );
        assert!(GameStatus::Resigned.is_over());
        assert!(!GameStatus::Active.is_over());
    }
}
