//! 走法生成和验证
//!
//! 服务端裁判与客户端高亮共用这一份规则实现。

use serde::{Deserialize, Serialize};

use crate::board::{Board, BoardState, CastleSide, KING_START_COL};
use crate::error::ChessError;
use crate::piece::{Piece, PieceType, Position, Side};

/// 车的方向
const ROOK_DIRECTIONS: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// 象的方向
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// 后的方向
const QUEEN_DIRECTIONS: [(i8, i8); 8] = [
    (0, 1),
    (0, -1),
    (1, 0),
    (-1, 0),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// 马的跳法
const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

/// 走法类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// 普通走子或吃子（含升变）
    Normal,
    /// 兵从起始行前进两格
    DoublePush,
    /// 吃过路兵
    EnPassant,
    /// 王车易位
    Castle(CastleSide),
}

/// 客户端附带的走法提示
///
/// 只用于在多个同终点的候选走法之间做选择，规则判断从不依赖它。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveHint {
    pub castling: Option<CastleSide>,
    pub en_passant: bool,
}

impl MoveHint {
    /// 提示是否与走法类型一致
    pub fn matches(&self, kind: MoveKind) -> bool {
        match kind {
            MoveKind::Castle(castle) => self.castling == Some(castle),
            MoveKind::EnPassant => self.en_passant && self.castling.is_none(),
            MoveKind::Normal | MoveKind::DoublePush => {
                !self.en_passant && self.castling.is_none()
            }
        }
    }
}

/// 走法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// 起始位置
    pub from: Position,
    /// 目标位置
    pub to: Position,
    /// 走法类型
    pub kind: MoveKind,
}

impl Move {
    /// 创建普通走法
    pub fn new(from: Position, to: Position) -> Self {
        Self::with_kind(from, to, MoveKind::Normal)
    }

    /// 创建指定类型的走法
    pub fn with_kind(from: Position, to: Position, kind: MoveKind) -> Self {
        Self { from, to, kind }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            MoveKind::Castle(CastleSide::Kingside) => write!(f, "O-O"),
            MoveKind::Castle(CastleSide::Queenside) => write!(f, "O-O-O"),
            MoveKind::EnPassant => write!(f, "{}x{} e.p.", self.from, self.to),
            _ => write!(f, "{}-{}", self.from, self.to),
        }
    }
}

/// 局面分类（针对当前走子方）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    /// 对局继续，`check` 为被将军的一方
    Ongoing { check: Option<Side> },
    /// 将死
    Checkmate { winner: Side },
    /// 逼和
    Stalemate,
}

/// 走法生成器
pub struct MoveGenerator;

impl MoveGenerator {
    /// 生成指定格子上棋子的伪合法走法（不考虑自己的王是否被将军）
    pub fn pseudo_legal_from(state: &BoardState, from: Position) -> Vec<Move> {
        let mut moves = Vec::with_capacity(28);
        if let Some(piece) = state.board.get(from) {
            Self::generate_piece_moves(state, from, piece, &mut moves);
        }
        moves
    }

    /// 生成指定格子上棋子的合法走法
    ///
    /// 每个候选走法都在棋盘副本上模拟，走完后己方王仍被攻击的走法会被过滤掉。
    pub fn legal_moves(state: &BoardState, from: Position) -> Vec<Move> {
        let Some(piece) = state.board.get(from) else {
            return Vec::new();
        };

        Self::pseudo_legal_from(state, from)
            .into_iter()
            .filter(|mv| {
                let next = state.board.after_move(mv);
                !Self::is_in_check(&next, piece.side)
            })
            .collect()
    }

    /// 生成当前走子方的所有合法走法
    pub fn generate_legal(state: &BoardState) -> Vec<Move> {
        state
            .board
            .pieces(state.current_turn)
            .into_iter()
            .flat_map(|(pos, _)| Self::legal_moves(state, pos))
            .collect()
    }

    /// 当前走子方是否还有合法走法
    pub fn has_any_legal_move(state: &BoardState) -> bool {
        state
            .board
            .pieces(state.current_turn)
            .into_iter()
            .any(|(pos, _)| !Self::legal_moves(state, pos).is_empty())
    }

    /// 在合法走法中查找与请求匹配的一步
    ///
    /// 走法类型总是由生成器重新推导；`hint` 只在同一终点有多个候选时用于选择。
    pub fn find_legal(
        state: &BoardState,
        from: Position,
        to: Position,
        hint: Option<MoveHint>,
    ) -> Result<Move, ChessError> {
        let piece = state.board.get(from).ok_or(ChessError::NoPiece(from))?;
        if piece.side != state.current_turn {
            return Err(ChessError::NotYourPiece(from));
        }

        let candidates: Vec<Move> = Self::legal_moves(state, from)
            .into_iter()
            .filter(|mv| mv.to == to)
            .collect();

        let chosen = hint
            .and_then(|h| candidates.iter().find(|mv| h.matches(mv.kind)))
            .or_else(|| candidates.first());

        chosen.copied().ok_or(ChessError::IllegalMove { from, to })
    }

    /// 生成指定棋子的所有伪合法走法
    fn generate_piece_moves(state: &BoardState, pos: Position, piece: Piece, moves: &mut Vec<Move>) {
        let board = &state.board;
        match piece.piece_type {
            PieceType::King => {
                Self::generate_king_moves(board, pos, piece.side, moves);
                Self::generate_castling_moves(state, pos, piece.side, moves);
            }
            PieceType::Queen => Self::generate_slider_moves(board, pos, piece.side, &QUEEN_DIRECTIONS, moves),
            PieceType::Rook => Self::generate_slider_moves(board, pos, piece.side, &ROOK_DIRECTIONS, moves),
            PieceType::Bishop => Self::generate_slider_moves(board, pos, piece.side, &BISHOP_DIRECTIONS, moves),
            PieceType::Knight => Self::generate_knight_moves(board, pos, piece.side, moves),
            PieceType::Pawn => {
                // 过路兵目标格只对当前走子方有效
                let en_passant = if piece.side == state.current_turn {
                    state.en_passant
                } else {
                    None
                };
                Self::generate_pawn_moves(board, pos, piece.side, en_passant, moves);
            }
        }
    }

    /// 生成滑行棋子（车、象、后）的走法
    fn generate_slider_moves(
        board: &Board,
        pos: Position,
        side: Side,
        directions: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(dr, dc) in directions {
            let mut current = pos;
            while let Some(to) = current.offset(dr, dc) {
                if let Some(target) = board.get(to) {
                    if target.side != side {
                        moves.push(Move::new(pos, to));
                    }
                    break;
                }
                moves.push(Move::new(pos, to));
                current = to;
            }
        }
    }

    /// 生成马的走法
    fn generate_knight_moves(board: &Board, pos: Position, side: Side, moves: &mut Vec<Move>) {
        for (dr, dc) in KNIGHT_OFFSETS {
            if let Some(to) = pos.offset(dr, dc) {
                Self::try_add_move(board, pos, to, side, moves);
            }
        }
    }

    /// 生成王的一格走法
    fn generate_king_moves(board: &Board, pos: Position, side: Side, moves: &mut Vec<Move>) {
        for (dr, dc) in QUEEN_DIRECTIONS {
            if let Some(to) = pos.offset(dr, dc) {
                Self::try_add_move(board, pos, to, side, moves);
            }
        }
    }

    /// 生成王车易位
    ///
    /// 要求：王和对应的车都未移动、车仍在角落、中间格为空、
    /// 王当前未被将军、王经过的格子不被攻击。落点由合法性过滤检查。
    fn generate_castling_moves(state: &BoardState, pos: Position, side: Side, moves: &mut Vec<Move>) {
        let board = &state.board;
        let row = side.back_row();
        if pos != Position::new_unchecked(row, KING_START_COL) {
            return;
        }

        let opponent = side.opponent();
        for castle in [CastleSide::Kingside, CastleSide::Queenside] {
            if !state.castling.can_castle(side, castle) {
                continue;
            }
            if board.get(castle.rook_from(row)) != Some(Piece::new(PieceType::Rook, side)) {
                continue;
            }
            let path_clear = castle
                .between_cols()
                .iter()
                .all(|&col| board.get(Position::new_unchecked(row, col)).is_none());
            if !path_clear {
                continue;
            }
            if Self::is_attacked(board, pos, opponent)
                || Self::is_attacked(board, castle.rook_to(row), opponent)
            {
                continue;
            }
            moves.push(Move::with_kind(pos, castle.king_to(row), MoveKind::Castle(castle)));
        }
    }

    /// 生成兵的走法
    fn generate_pawn_moves(
        board: &Board,
        pos: Position,
        side: Side,
        en_passant: Option<Position>,
        moves: &mut Vec<Move>,
    ) {
        let forward = side.forward();

        // 前进一格
        if let Some(one) = pos.offset(forward, 0) {
            if board.get(one).is_none() {
                moves.push(Move::new(pos, one));

                // 起始行可以前进两格
                if pos.row == side.pawn_row() {
                    if let Some(two) = one.offset(forward, 0) {
                        if board.get(two).is_none() {
                            moves.push(Move::with_kind(pos, two, MoveKind::DoublePush));
                        }
                    }
                }
            }
        }

        // 斜向吃子
        for dc in [-1i8, 1i8] {
            let Some(to) = pos.offset(forward, dc) else {
                continue;
            };
            match board.get(to) {
                Some(target) if target.side != side => moves.push(Move::new(pos, to)),
                Some(_) => {}
                None if en_passant == Some(to) => {
                    moves.push(Move::with_kind(pos, to, MoveKind::EnPassant));
                }
                None => {}
            }
        }
    }

    /// 尝试添加走法（目标为空或为敌方棋子）
    fn try_add_move(board: &Board, from: Position, to: Position, side: Side, moves: &mut Vec<Move>) {
        match board.get(to) {
            Some(target) if target.side == side => {}
            _ => moves.push(Move::new(from, to)),
        }
    }

    /// 检查某格是否被指定阵营攻击
    ///
    /// 只使用棋子的攻击模式，不做合法性过滤，也不包含易位，避免递归。
    pub fn is_attacked(board: &Board, target: Position, by: Side) -> bool {
        board
            .pieces(by)
            .into_iter()
            .any(|(pos, piece)| Self::can_attack(board, pos, piece, target))
    }

    /// 检查指定阵营的王是否被将军
    ///
    /// 找不到王时返回 false。
    pub fn is_in_check(board: &Board, side: Side) -> bool {
        match board.find_king(side) {
            Some(king_pos) => Self::is_attacked(board, king_pos, side.opponent()),
            None => false,
        }
    }

    /// 检查棋子是否能攻击到目标位置
    fn can_attack(board: &Board, from: Position, piece: Piece, target: Position) -> bool {
        if from == target {
            return false;
        }
        let dr = target.row as i8 - from.row as i8;
        let dc = target.col as i8 - from.col as i8;

        match piece.piece_type {
            PieceType::Pawn => dr == piece.side.forward() && dc.abs() == 1,
            PieceType::Knight => {
                (dr.abs() == 1 && dc.abs() == 2) || (dr.abs() == 2 && dc.abs() == 1)
            }
            PieceType::King => dr.abs() <= 1 && dc.abs() <= 1,
            PieceType::Rook => (dr == 0 || dc == 0) && Self::ray_clear(board, from, target),
            PieceType::Bishop => dr.abs() == dc.abs() && Self::ray_clear(board, from, target),
            PieceType::Queen => {
                (dr == 0 || dc == 0 || dr.abs() == dc.abs()) && Self::ray_clear(board, from, target)
            }
        }
    }

    /// 检查两格之间（不含端点）的直线或斜线上没有棋子
    fn ray_clear(board: &Board, from: Position, target: Position) -> bool {
        let dr = (target.row as i8 - from.row as i8).signum();
        let dc = (target.col as i8 - from.col as i8).signum();

        let mut current = from;
        while let Some(next) = current.offset(dr, dc) {
            if next == target {
                return true;
            }
            if board.get(next).is_some() {
                return false;
            }
            current = next;
        }
        false
    }

    /// 判定当前走子方的局面：将死、逼和或继续
    pub fn classify(state: &BoardState) -> PositionStatus {
        let side = state.current_turn;
        let in_check = Self::is_in_check(&state.board, side);

        if Self::has_any_legal_move(state) {
            PositionStatus::Ongoing {
                check: in_check.then_some(side),
            }
        } else if in_check {
            PositionStatus::Checkmate {
                winner: side.opponent(),
            }
        } else {
            PositionStatus::Stalemate
        }
    }
}
