//! 国际象棋共享协议库
//!
//! 包含:
//! - 棋子、棋盘、坐标等核心数据结构
//! - 唯一的一份规则引擎：走法生成、攻击判定、将死/逼和判定
//! - 消息类型定义 (ClientMessage, ServerMessage)
//! - 传输层抽象与帧编解码
//! - FEN 格式

mod board;
mod constants;
mod error;
mod fen;
mod message;
mod moves;
mod piece;
mod transport;

pub use board::{Board, BoardState, CastleSide, CastlingRights, MoveEffect, SideCastling};
pub use constants::*;
pub use error::{ChessError, ProtocolError, Result};
pub use fen::{Fen, INITIAL_FEN};
pub use message::{
    Captures, ClientMessage, ErrorCode, GameId, GameOverReason, GameSnapshot, GameStatus,
    Identity, PlayerId, ServerMessage,
};
pub use moves::{Move, MoveGenerator, MoveHint, MoveKind, PositionStatus};
pub use piece::{Piece, PieceType, Position, Side};
pub use transport::{
    Connection, FrameReader, FrameWriter, Listener, NetworkConfig, TcpConnection, TcpListener,
};
