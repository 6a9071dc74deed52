//! FEN 格式解析和生成
//!
//! 标准国际象棋 FEN：
//! `<棋盘> <走子方> <易位权> <过路兵目标格> [半回合计数] [回合数]`
//!
//! 计数字段会被接受但不参与规则（不实现 50 回合规则）。

use crate::board::{Board, BoardState, CastleSide, CastlingRights};
use crate::constants::BOARD_SIZE;
use crate::error::ChessError;
use crate::piece::{Piece, Position, Side};

/// 初始局面 FEN
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// FEN 格式处理
pub struct Fen;

impl Fen {
    /// 解析 FEN 字符串为棋盘状态
    pub fn parse(fen: &str) -> Result<BoardState, ChessError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.is_empty() {
            return Err(ChessError::InvalidFen {
                reason: "Empty FEN string".to_string(),
            });
        }

        let board = Self::parse_board(parts[0])?;

        let current_turn = match parts.get(1) {
            Some(s) => s
                .chars()
                .next()
                .and_then(Side::from_fen_char)
                .ok_or_else(|| ChessError::InvalidFen {
                    reason: format!("Invalid side to move: {}", s),
                })?,
            None => Side::White,
        };

        let castling = match parts.get(2) {
            Some(s) => Self::parse_castling(s)?,
            None => CastlingRights::none(),
        };

        let en_passant = match parts.get(3) {
            Some(&"-") | None => None,
            Some(s) => Some(s.parse::<Position>().map_err(|_| ChessError::InvalidFen {
                reason: format!("Invalid en passant square: {}", s),
            })?),
        };

        Ok(BoardState {
            board,
            current_turn,
            castling,
            en_passant,
        })
    }

    /// 解析棋盘部分
    fn parse_board(board_str: &str) -> Result<Board, ChessError> {
        let mut board = Board::empty();
        let rows: Vec<&str> = board_str.split('/').collect();

        if rows.len() != BOARD_SIZE {
            return Err(ChessError::InvalidFen {
                reason: format!("Expected 8 rows, got {}", rows.len()),
            });
        }

        // FEN 从第 8 横线开始，对应第 0 行
        for (row_idx, row) in rows.iter().enumerate() {
            let mut col = 0u8;

            for c in row.chars() {
                if col as usize >= BOARD_SIZE {
                    return Err(ChessError::InvalidFen {
                        reason: format!("Row {} has too many columns", row_idx),
                    });
                }

                if let Some(empty_count) = c.to_digit(10) {
                    col += empty_count as u8;
                } else if let Some(piece) = Piece::from_fen_char(c) {
                    board.set(Position::new_unchecked(row_idx as u8, col), Some(piece));
                    col += 1;
                } else {
                    return Err(ChessError::InvalidFen {
                        reason: format!("Invalid piece character: {}", c),
                    });
                }
            }

            if col as usize != BOARD_SIZE {
                return Err(ChessError::InvalidFen {
                    reason: format!("Row {} has {} columns, expected 8", row_idx, col),
                });
            }
        }

        Ok(board)
    }

    /// 解析易位权字段
    fn parse_castling(s: &str) -> Result<CastlingRights, ChessError> {
        let mut rights = CastlingRights::none();
        if s == "-" {
            return Ok(rights);
        }

        // 先全部收回，再按出现的字母恢复对应的"未移动"标记
        for c in s.chars() {
            let (side, castle) = match c {
                'K' => (Side::White, CastleSide::Kingside),
                'Q' => (Side::White, CastleSide::Queenside),
                'k' => (Side::Black, CastleSide::Kingside),
                'q' => (Side::Black, CastleSide::Queenside),
                _ => {
                    return Err(ChessError::InvalidFen {
                        reason: format!("Invalid castling character: {}", c),
                    })
                }
            };
            let entry = match side {
                Side::White => &mut rights.white,
                Side::Black => &mut rights.black,
            };
            entry.king_moved = false;
            match castle {
                CastleSide::Kingside => entry.kingside_rook_moved = false,
                CastleSide::Queenside => entry.queenside_rook_moved = false,
            }
        }

        Ok(rights)
    }

    /// 将棋盘状态转换为 FEN 字符串
    pub fn to_string(state: &BoardState) -> String {
        let en_passant = state
            .en_passant
            .map(|pos| pos.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{} {} {} {} 0 1",
            Self::board_to_string(&state.board),
            state.current_turn.to_fen_char(),
            Self::castling_to_string(&state.castling),
            en_passant
        )
    }

    /// 棋盘部分转换为 FEN
    fn board_to_string(board: &Board) -> String {
        let mut rows = Vec::with_capacity(BOARD_SIZE);

        for row in 0..BOARD_SIZE as u8 {
            let mut row_str = String::new();
            let mut empty_count = 0;

            for col in 0..BOARD_SIZE as u8 {
                match board.get(Position::new_unchecked(row, col)) {
                    Some(piece) => {
                        if empty_count > 0 {
                            row_str.push_str(&empty_count.to_string());
                            empty_count = 0;
                        }
                        row_str.push(piece.to_fen_char());
                    }
                    None => empty_count += 1,
                }
            }

            if empty_count > 0 {
                row_str.push_str(&empty_count.to_string());
            }
            rows.push(row_str);
        }

        rows.join("/")
    }

    /// 易位权转换为 FEN
    fn castling_to_string(rights: &CastlingRights) -> String {
        let mut s = String::new();
        for (side, castle, c) in [
            (Side::White, CastleSide::Kingside, 'K'),
            (Side::White, CastleSide::Queenside, 'Q'),
            (Side::Black, CastleSide::Kingside, 'k'),
            (Side::Black, CastleSide::Queenside, 'q'),
        ] {
            if rights.can_castle(side, castle) {
                s.push(c);
            }
        }
        if s.is_empty() {
            s.push('-');
        }
        s
    }
}
