//! 错误类型定义

use thiserror::Error;

use crate::piece::Position;

/// 国际象棋规则错误
///
/// 所有变体都表示"操作被拒绝且没有任何状态变化"。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChessError {
    /// 无效的坐标
    #[error("Invalid square: {0}")]
    InvalidSquare(String),

    /// 起点没有棋子
    #[error("No piece on {0}")]
    NoPiece(Position),

    /// 起点棋子不属于走子方
    #[error("Piece on {0} does not belong to the mover")]
    NotYourPiece(Position),

    /// 不是你的回合
    #[error("Not your turn")]
    NotYourTurn,

    /// 目标格不在合法走法内
    #[error("Illegal move: {from} -> {to}")]
    IllegalMove { from: Position, to: Position },

    /// 对局已结束
    #[error("Game is already over")]
    GameOver,

    /// 身份未绑定到该对局
    #[error("Player is not a participant of this game")]
    NotAParticipant,

    /// 无效的 FEN 字符串
    #[error("Invalid FEN string: {reason}")]
    InvalidFen { reason: String },
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误（bincode）
    #[error("Bincode serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 规则错误
    #[error("Chess error: {0}")]
    Chess(#[from] ChessError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
