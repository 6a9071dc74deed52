//! 棋盘状态

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::moves::{Move, MoveKind};
use crate::piece::{Piece, PieceType, Position, Side};

/// 底线棋子排列（a 线到 h 线）
const BACK_RANK: [PieceType; BOARD_SIZE] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

/// 王的初始列（e 线）
pub const KING_START_COL: u8 = 4;

/// 棋盘
///
/// 8x8 的值类型，复制开销很小；模拟走法时直接在副本上操作，
/// 不会修改调用方持有的棋盘。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// squares[row][col]
    squares: [[Option<Piece>; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            squares: [[None; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// 创建初始棋盘
    pub fn initial() -> Self {
        let mut board = Self::empty();

        for side in [Side::White, Side::Black] {
            for (col, piece_type) in BACK_RANK.iter().enumerate() {
                board.set(
                    Position::new_unchecked(side.back_row(), col as u8),
                    Some(Piece::new(*piece_type, side)),
                );
                board.set(
                    Position::new_unchecked(side.pawn_row(), col as u8),
                    Some(Piece::new(PieceType::Pawn, side)),
                );
            }
        }

        board
    }

    /// 获取指定位置的棋子
    pub fn get(&self, pos: Position) -> Option<Piece> {
        if pos.is_valid() {
            self.squares[pos.row as usize][pos.col as usize]
        } else {
            None
        }
    }

    /// 设置指定位置的棋子
    pub fn set(&mut self, pos: Position, piece: Option<Piece>) {
        if pos.is_valid() {
            self.squares[pos.row as usize][pos.col as usize] = piece;
        }
    }

    /// 查找指定阵营的王
    pub fn find_king(&self, side: Side) -> Option<Position> {
        Position::all().find(|&pos| {
            self.get(pos) == Some(Piece::new(PieceType::King, side))
        })
    }

    /// 获取指定阵营的所有棋子位置
    pub fn pieces(&self, side: Side) -> Vec<(Position, Piece)> {
        Position::all()
            .filter_map(|pos| self.get(pos).map(|piece| (pos, piece)))
            .filter(|(_, piece)| piece.side == side)
            .collect()
    }

    /// 返回执行走法后的新棋盘（不检查规则）
    ///
    /// 处理吃过路兵时移除被吃的兵、王车易位时移动车、兵到底线升变为后。
    pub fn after_move(&self, mv: &Move) -> Board {
        let mut next = *self;
        let Some(piece) = self.get(mv.from) else {
            return next;
        };

        next.set(mv.from, None);

        match mv.kind {
            MoveKind::EnPassant => {
                // 被吃的兵在起点同一行、终点同一列
                next.set(Position::new_unchecked(mv.from.row, mv.to.col), None);
            }
            MoveKind::Castle(castle) => {
                let row = mv.from.row;
                let rook_from = castle.rook_from(row);
                let rook = next.get(rook_from);
                next.set(rook_from, None);
                next.set(castle.rook_to(row), rook);
            }
            MoveKind::Normal | MoveKind::DoublePush => {}
        }

        let placed = if piece.piece_type == PieceType::Pawn && mv.to.row == piece.side.promotion_row() {
            Piece::new(PieceType::Queen, piece.side)
        } else {
            piece
        };
        next.set(mv.to, Some(placed));

        next
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..BOARD_SIZE as u8 {
            write!(f, "{} ", BOARD_SIZE as u8 - row)?;
            for col in 0..BOARD_SIZE as u8 {
                match self.get(Position::new_unchecked(row, col)) {
                    Some(piece) => write!(f, "{}", piece.symbol())?,
                    None => write!(f, "·")?,
                }
            }
            writeln!(f)?;
        }
        write!(f, "  abcdefgh")
    }
}

/// 易位方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastleSide {
    /// 短易位（h 线车）
    Kingside,
    /// 长易位（a 线车）
    Queenside,
}

impl CastleSide {
    /// 车的初始位置
    pub fn rook_from(&self, row: u8) -> Position {
        match self {
            CastleSide::Kingside => Position::new_unchecked(row, 7),
            CastleSide::Queenside => Position::new_unchecked(row, 0),
        }
    }

    /// 易位后车的位置
    pub fn rook_to(&self, row: u8) -> Position {
        match self {
            CastleSide::Kingside => Position::new_unchecked(row, 5),
            CastleSide::Queenside => Position::new_unchecked(row, 3),
        }
    }

    /// 易位后王的位置
    pub fn king_to(&self, row: u8) -> Position {
        match self {
            CastleSide::Kingside => Position::new_unchecked(row, 6),
            CastleSide::Queenside => Position::new_unchecked(row, 2),
        }
    }

    /// 王与车之间必须为空的列
    pub fn between_cols(&self) -> &'static [u8] {
        match self {
            CastleSide::Kingside => &[5, 6],
            CastleSide::Queenside => &[1, 2, 3],
        }
    }

    /// 根据车的初始列判断易位方向
    pub fn from_rook_col(col: u8) -> Option<CastleSide> {
        match col {
            7 => Some(CastleSide::Kingside),
            0 => Some(CastleSide::Queenside),
            _ => None,
        }
    }
}

/// 单方的易位记录
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCastling {
    pub king_moved: bool,
    pub queenside_rook_moved: bool,
    pub kingside_rook_moved: bool,
}

/// 易位权
///
/// 只会从"未移动"变为"已移动"，不会恢复。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white: SideCastling,
    pub black: SideCastling,
}

impl CastlingRights {
    /// 双方都保有全部易位权
    pub fn new() -> Self {
        Self::default()
    }

    /// 双方都没有易位权
    pub fn none() -> Self {
        let lost = SideCastling {
            king_moved: true,
            queenside_rook_moved: true,
            kingside_rook_moved: true,
        };
        Self {
            white: lost,
            black: lost,
        }
    }

    fn of(&self, side: Side) -> &SideCastling {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    fn of_mut(&mut self, side: Side) -> &mut SideCastling {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }

    /// 王和对应的车是否都未移动
    pub fn can_castle(&self, side: Side, castle: CastleSide) -> bool {
        let rights = self.of(side);
        let rook_moved = match castle {
            CastleSide::Kingside => rights.kingside_rook_moved,
            CastleSide::Queenside => rights.queenside_rook_moved,
        };
        !rights.king_moved && !rook_moved
    }

    /// 王移动后取消该方易位权
    pub fn revoke_king(&mut self, side: Side) {
        self.of_mut(side).king_moved = true;
    }

    /// 车离开（或在原位被吃）后取消对应方向的易位权
    pub fn revoke_rook(&mut self, side: Side, castle: CastleSide) {
        let rights = self.of_mut(side);
        match castle {
            CastleSide::Kingside => rights.kingside_rook_moved = true,
            CastleSide::Queenside => rights.queenside_rook_moved = true,
        }
    }

    /// 根据一步棋更新易位权
    pub fn update(&mut self, mv: &Move, moved: Piece, captured: Option<Piece>) {
        match moved.piece_type {
            PieceType::King => self.revoke_king(moved.side),
            PieceType::Rook if mv.from.row == moved.side.back_row() => {
                if let Some(castle) = CastleSide::from_rook_col(mv.from.col) {
                    self.revoke_rook(moved.side, castle);
                }
            }
            _ => {}
        }

        if let Some(victim) = captured {
            if victim.piece_type == PieceType::Rook && mv.to.row == victim.side.back_row() {
                if let Some(castle) = CastleSide::from_rook_col(mv.to.col) {
                    self.revoke_rook(victim.side, castle);
                }
            }
        }
    }
}

/// 一步棋执行后的效果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveEffect {
    /// 走动的棋子（升变前）
    pub moved: Piece,
    /// 被吃的棋子
    pub captured: Option<Piece>,
    /// 是否升变
    pub promoted: bool,
}

/// 完整的棋盘状态（棋盘 + 走子方 + 易位权 + 过路兵目标格）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    /// 棋盘
    pub board: Board,
    /// 当前走子方
    pub current_turn: Side,
    /// 易位权
    pub castling: CastlingRights,
    /// 过路兵目标格，只对紧接着的下一步有效
    pub en_passant: Option<Position>,
}

impl BoardState {
    /// 创建初始状态
    pub fn initial() -> Self {
        Self {
            board: Board::initial(),
            current_turn: Side::White,
            castling: CastlingRights::new(),
            en_passant: None,
        }
    }

    /// 从棋盘创建状态（无易位权、无过路兵）
    pub fn from_board(board: Board, current_turn: Side) -> Self {
        Self {
            board,
            current_turn,
            castling: CastlingRights::none(),
            en_passant: None,
        }
    }

    /// 执行一步棋（不检查合法性）
    ///
    /// 调用方必须保证 `mv` 来自 `MoveGenerator::legal_moves`。
    pub fn make_move(&mut self, mv: &Move) -> Option<MoveEffect> {
        let moved = self.board.get(mv.from)?;
        let captured = match mv.kind {
            MoveKind::EnPassant => self
                .board
                .get(Position::new_unchecked(mv.from.row, mv.to.col)),
            _ => self.board.get(mv.to),
        };
        let promoted =
            moved.piece_type == PieceType::Pawn && mv.to.row == moved.side.promotion_row();

        self.board = self.board.after_move(mv);

        self.en_passant = None;
        if mv.kind == MoveKind::DoublePush {
            self.en_passant = Some(Position::new_unchecked(
                (mv.from.row + mv.to.row) / 2,
                mv.from.col,
            ));
        }

        self.castling.update(mv, moved, captured);
        self.current_turn = self.current_turn.opponent();

        Some(MoveEffect {
            moved,
            captured,
            promoted,
        })
    }
}

impl Default for BoardState {
    fn default() -> Self {
        Self::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Position {
        s.parse().unwrap()
    }

    #[test]
    fn test_initial_board() {
        let board = Board::initial();

        assert_eq!(board.get(sq("e1")), Some(Piece::new(PieceType::King, Side::White)));
        assert_eq!(board.get(sq("d8")), Some(Piece::new(PieceType::Queen, Side::Black)));
        assert_eq!(board.get(sq("a2")), Some(Piece::new(PieceType::Pawn, Side::White)));
        assert_eq!(board.get(sq("h7")), Some(Piece::new(PieceType::Pawn, Side::Black)));
        assert!(board.get(sq("e4")).is_none());

        assert_eq!(board.pieces(Side::White).len(), 16);
        assert_eq!(board.pieces(Side::Black).len(), 16);
    }

    #[test]
    fn test_find_king() {
        let board = Board::initial();
        assert_eq!(board.find_king(Side::White), Some(sq("e1")));
        assert_eq!(board.find_king(Side::Black), Some(sq("e8")));
        assert_eq!(Board::empty().find_king(Side::White), None);
    }

    #[test]
    fn test_after_move_leaves_original() {
        let board = Board::initial();
        let next = board.after_move(&Move::new(sq("g1"), sq("f3")));

        assert_eq!(board.get(sq("g1")), Some(Piece::new(PieceType::Knight, Side::White)));
        assert!(next.get(sq("g1")).is_none());
        assert_eq!(next.get(sq("f3")), Some(Piece::new(PieceType::Knight, Side::White)));
    }

    #[test]
    fn test_after_move_castle_relocates_rook() {
        let mut board = Board::empty();
        board.set(sq("e1"), Some(Piece::new(PieceType::King, Side::White)));
        board.set(sq("a1"), Some(Piece::new(PieceType::Rook, Side::White)));

        let mv = Move::with_kind(sq("e1"), sq("c1"), MoveKind::Castle(CastleSide::Queenside));
        let next = board.after_move(&mv);

        assert_eq!(next.get(sq("c1")), Some(Piece::new(PieceType::King, Side::White)));
        assert_eq!(next.get(sq("d1")), Some(Piece::new(PieceType::Rook, Side::White)));
        assert!(next.get(sq("a1")).is_none());
        assert!(next.get(sq("e1")).is_none());
    }

    #[test]
    fn test_make_move_sets_and_clears_en_passant() {
        let mut state = BoardState::initial();

        state.make_move(&Move::with_kind(sq("e2"), sq("e4"), MoveKind::DoublePush));
        assert_eq!(state.en_passant, Some(sq("e3")));
        assert_eq!(state.current_turn, Side::Black);

        state.make_move(&Move::new(sq("g8"), sq("f6")));
        assert_eq!(state.en_passant, None);
        assert_eq!(state.current_turn, Side::White);
    }

    #[test]
    fn test_castling_rights_are_monotonic() {
        let mut rights = CastlingRights::new();
        let rook = Piece::new(PieceType::Rook, Side::White);

        rights.update(&Move::new(sq("h1"), sq("h3")), rook, None);
        assert!(!rights.can_castle(Side::White, CastleSide::Kingside));
        assert!(rights.can_castle(Side::White, CastleSide::Queenside));

        // 车回到原位也不会恢复
        rights.update(&Move::new(sq("h3"), sq("h1")), rook, None);
        assert!(!rights.can_castle(Side::White, CastleSide::Kingside));

        let king = Piece::new(PieceType::King, Side::White);
        rights.update(&Move::new(sq("e1"), sq("e2")), king, None);
        assert!(!rights.can_castle(Side::White, CastleSide::Queenside));
        assert!(rights.can_castle(Side::Black, CastleSide::Kingside));
    }

    #[test]
    fn test_rook_captured_on_corner_revokes_right() {
        let mut rights = CastlingRights::new();
        let bishop = Piece::new(PieceType::Bishop, Side::White);
        let victim = Piece::new(PieceType::Rook, Side::Black);

        rights.update(&Move::new(sq("b7"), sq("a8")), bishop, Some(victim));
        assert!(!rights.can_castle(Side::Black, CastleSide::Queenside));
        assert!(rights.can_castle(Side::Black, CastleSide::Kingside));
    }
}
