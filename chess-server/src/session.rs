//! 对局状态机
//!
//! `Active` → {`Checkmate`, `Stalemate`, `Resigned`, `Disconnected`}，终局后不再接受任何操作。

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use protocol::{
    BoardState, Captures, ChessError, Fen, GameId, GameOverReason, GameSnapshot, GameStatus,
    Identity, Move, MoveGenerator, MoveHint, PlayerId, Position, PositionStatus, Side,
};

/// 终局结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOutcome {
    pub status: GameStatus,
    pub winner: Option<Side>,
    pub reason: GameOverReason,
}

/// 单局对局
#[derive(Debug, Clone)]
pub struct GameSession {
    pub id: GameId,
    /// 白方（先进入队列的一方）
    pub white: Identity,
    /// 黑方
    pub black: Identity,
    pub started_at: DateTime<Utc>,
    state: BoardState,
    history: Vec<Move>,
    captures: Captures,
    check: Option<Side>,
    status: GameStatus,
    winner: Option<Side>,
}

impl GameSession {
    /// 以标准初始局面创建对局
    pub fn new(id: GameId, white: Identity, black: Identity) -> Self {
        Self::from_state(id, white, black, BoardState::initial())
    }

    /// 从指定局面创建对局
    pub fn from_state(id: GameId, white: Identity, black: Identity, state: BoardState) -> Self {
        Self {
            id,
            white,
            black,
            started_at: Utc::now(),
            state,
            history: Vec::new(),
            captures: Captures::default(),
            check: None,
            status: GameStatus::Active,
            winner: None,
        }
    }

    /// 获取玩家的颜色
    pub fn side_of(&self, player_id: PlayerId) -> Option<Side> {
        if self.white.id == player_id {
            Some(Side::White)
        } else if self.black.id == player_id {
            Some(Side::Black)
        } else {
            None
        }
    }

    /// 检查玩家是否在对局中
    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.side_of(player_id).is_some()
    }

    /// 获取指定颜色的玩家
    pub fn player(&self, side: Side) -> &Identity {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    /// 双方玩家 ID
    pub fn player_ids(&self) -> [PlayerId; 2] {
        [self.white.id, self.black.id]
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn check(&self) -> Option<Side> {
        self.check
    }

    pub fn turn(&self) -> Side {
        self.state.current_turn
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn history(&self) -> &[Move] {
        &self.history
    }

    pub fn captures(&self) -> &Captures {
        &self.captures
    }

    /// 校验并执行一步棋
    ///
    /// 被拒绝时不改变任何状态。
    pub fn apply_move(
        &mut self,
        player_id: PlayerId,
        from: Position,
        to: Position,
        hint: Option<MoveHint>,
    ) -> Result<GameSnapshot, ChessError> {
        if !self.is_active() {
            return Err(ChessError::GameOver);
        }
        let side = self.side_of(player_id).ok_or(ChessError::NotAParticipant)?;
        if side != self.state.current_turn {
            return Err(ChessError::NotYourTurn);
        }

        let mv = MoveGenerator::find_legal(&self.state, from, to, hint)?;
        if let Some(h) = hint {
            if !h.matches(mv.kind) {
                debug!(game_id = self.id, %mv, ?h, "走法提示与推导出的走法类型不一致");
            }
        }

        let effect = self.state.make_move(&mv).ok_or(ChessError::NoPiece(from))?;
        if let Some(captured) = effect.captured {
            self.captures.record(side, captured);
        }
        self.history.push(mv);
        self.refresh_status();

        debug!(
            game_id = self.id,
            %mv,
            promoted = effect.promoted,
            status = ?self.status,
            fen = %Fen::to_string(&self.state),
            "走法已执行"
        );

        Ok(self.snapshot())
    }

    /// 根据新走子方的局面更新将军状态与终局状态
    ///
    /// 任一方缺王时不做终局判定，对局保持进行中。
    fn refresh_status(&mut self) {
        let to_move = self.state.current_turn;
        let missing = [to_move, to_move.opponent()]
            .into_iter()
            .find(|&side| self.state.board.find_king(side).is_none());
        if let Some(side) = missing {
            error!(
                game_id = self.id,
                side = %side,
                fen = %Fen::to_string(&self.state),
                "对局进行中找不到王"
            );
            self.check = None;
            return;
        }

        match MoveGenerator::classify(&self.state) {
            PositionStatus::Ongoing { check } => {
                self.check = check;
            }
            PositionStatus::Checkmate { winner } => {
                self.check = Some(to_move);
                self.status = GameStatus::Checkmate;
                self.winner = Some(winner);
            }
            PositionStatus::Stalemate => {
                self.check = None;
                self.status = GameStatus::Stalemate;
                self.winner = None;
            }
        }
    }

    /// 认输，对方获胜
    pub fn resign(&mut self, player_id: PlayerId) -> Result<GameOutcome, ChessError> {
        self.forfeit(player_id, GameStatus::Resigned)
    }

    /// 断线，对方获胜
    pub fn disconnect(&mut self, player_id: PlayerId) -> Result<GameOutcome, ChessError> {
        self.forfeit(player_id, GameStatus::Disconnected)
    }

    fn forfeit(&mut self, player_id: PlayerId, status: GameStatus) -> Result<GameOutcome, ChessError> {
        if !self.is_active() {
            return Err(ChessError::GameOver);
        }
        let side = self.side_of(player_id).ok_or(ChessError::NotAParticipant)?;

        self.status = status;
        self.winner = Some(side.opponent());

        self.outcome().ok_or(ChessError::GameOver)
    }

    /// 终局结果（进行中返回 None）
    pub fn outcome(&self) -> Option<GameOutcome> {
        GameOverReason::from_status(self.status).map(|reason| GameOutcome {
            status: self.status,
            winner: self.winner,
            reason,
        })
    }

    /// 查询某格棋子的合法走法（只读）
    ///
    /// 不是请求方的回合或棋子不属于请求方时返回空列表。
    pub fn legal_moves_for(&self, player_id: PlayerId, from: Position) -> Result<Vec<Move>, ChessError> {
        let side = self.side_of(player_id).ok_or(ChessError::NotAParticipant)?;
        if !self.is_active() {
            return Err(ChessError::GameOver);
        }
        if side != self.state.current_turn {
            return Ok(Vec::new());
        }
        match self.state.board.get(from) {
            Some(piece) if piece.side == side => Ok(MoveGenerator::legal_moves(&self.state, from)),
            _ => Ok(Vec::new()),
        }
    }

    /// 公开状态
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            board: self.state.board,
            turn: self.state.current_turn,
            last_move: self.history.last().copied(),
            check: self.check,
            status: self.status,
            winner: self.winner,
            captures: self.captures.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Fen, Piece, PieceType};

    const WHITE: PlayerId = 1;
    const BLACK: PlayerId = 2;

    fn sq(s: &str) -> Position {
        s.parse().unwrap()
    }

    fn new_session() -> GameSession {
        GameSession::new(1, Identity::new(WHITE, "alice"), Identity::new(BLACK, "bob"))
    }

    fn play(session: &mut GameSession, moves: &[(&str, &str)]) {
        for (i, (from, to)) in moves.iter().enumerate() {
            let player = if session.turn() == Side::White { WHITE } else { BLACK };
            session
                .apply_move(player, sq(from), sq(to), None)
                .unwrap_or_else(|e| panic!("move {} {}-{} rejected: {}", i, from, to, e));
        }
    }

    #[test]
    fn test_fools_mate() {
        let mut session = new_session();
        play(&mut session, &[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")]);

        assert_eq!(session.status(), GameStatus::Checkmate);
        assert_eq!(session.winner(), Some(Side::Black));
        assert_eq!(session.check(), Some(Side::White));

        let outcome = session.outcome().unwrap();
        assert_eq!(outcome.reason, GameOverReason::Checkmate);

        // 终局后不再接受走法
        assert_eq!(
            session.apply_move(WHITE, sq("a2"), sq("a3"), None),
            Err(ChessError::GameOver)
        );
    }

    #[test]
    fn test_ten_move_stalemate() {
        let mut session = new_session();
        play(
            &mut session,
            &[
                ("e2", "e3"), ("a7", "a5"),
                ("d1", "h5"), ("a8", "a6"),
                ("h5", "a5"), ("h7", "h5"),
                ("h2", "h4"), ("a6", "h6"),
                ("a5", "c7"), ("f7", "f6"),
                ("c7", "d7"), ("e8", "f7"),
                ("d7", "b7"), ("d8", "d3"),
                ("b7", "b8"), ("d3", "h7"),
                ("b8", "c8"), ("f7", "g6"),
                ("c8", "e6"),
            ],
        );

        assert_eq!(session.status(), GameStatus::Stalemate);
        assert_eq!(session.winner(), None);
        assert_eq!(session.check(), None);
        assert_eq!(session.captures().by_white.len(), 6);
    }

    #[test]
    fn test_wrong_turn_is_rejected_without_change() {
        let mut session = new_session();
        let before = session.snapshot();

        assert_eq!(
            session.apply_move(BLACK, sq("e7"), sq("e5"), None),
            Err(ChessError::NotYourTurn)
        );
        assert_eq!(session.snapshot(), before);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_rejections() {
        let mut session = new_session();

        assert_eq!(
            session.apply_move(99, sq("e2"), sq("e4"), None),
            Err(ChessError::NotAParticipant)
        );
        assert_eq!(
            session.apply_move(WHITE, sq("e4"), sq("e5"), None),
            Err(ChessError::NoPiece(sq("e4")))
        );
        assert_eq!(
            session.apply_move(WHITE, sq("e7"), sq("e5"), None),
            Err(ChessError::NotYourPiece(sq("e7")))
        );
        assert_eq!(
            session.apply_move(WHITE, sq("e2"), sq("e5"), None),
            Err(ChessError::IllegalMove { from: sq("e2"), to: sq("e5") })
        );
        assert_eq!(session.turn(), Side::White);
    }

    #[test]
    fn test_en_passant_credits_capturing_side() {
        let mut session = new_session();
        play(
            &mut session,
            &[("a2", "a3"), ("d7", "d5"), ("a3", "a4"), ("d5", "d4"), ("e2", "e4")],
        );
        assert_eq!(session.state().en_passant, Some(sq("e3")));

        let snapshot = session.apply_move(BLACK, sq("d4"), sq("e3"), None).unwrap();

        assert!(snapshot.board.get(sq("e4")).is_none());
        assert_eq!(snapshot.captures.by_black, vec![Piece::new(PieceType::Pawn, Side::White)]);
        assert!(snapshot.captures.by_white.is_empty());
        assert_eq!(snapshot.last_move.map(|m| m.to), Some(sq("e3")));
    }

    #[test]
    fn test_castling_revokes_both_rights() {
        let mut session = new_session();
        play(
            &mut session,
            &[("e2", "e4"), ("e7", "e5"), ("g1", "f3"), ("b8", "c6"), ("f1", "c4"), ("g8", "f6")],
        );

        let hint = MoveHint {
            castling: Some(protocol::CastleSide::Kingside),
            en_passant: false,
        };
        let snapshot = session.apply_move(WHITE, sq("e1"), sq("g1"), Some(hint)).unwrap();

        assert_eq!(snapshot.board.get(sq("g1")), Some(Piece::new(PieceType::King, Side::White)));
        assert_eq!(snapshot.board.get(sq("f1")), Some(Piece::new(PieceType::Rook, Side::White)));
        assert!(snapshot.board.get(sq("h1")).is_none());

        let castling = session.state().castling;
        assert!(!castling.can_castle(Side::White, protocol::CastleSide::Kingside));
        assert!(!castling.can_castle(Side::White, protocol::CastleSide::Queenside));
        assert!(castling.can_castle(Side::Black, protocol::CastleSide::Kingside));
    }

    #[test]
    fn test_promotion_reaches_queen() {
        let state = Fen::parse("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mut session = GameSession::from_state(
            3,
            Identity::new(WHITE, "alice"),
            Identity::new(BLACK, "bob"),
            state,
        );

        let snapshot = session.apply_move(WHITE, sq("a7"), sq("a8"), None).unwrap();
        assert_eq!(snapshot.board.get(sq("a8")), Some(Piece::new(PieceType::Queen, Side::White)));
        // 升变后的后从 a8 将军 e8
        assert_eq!(snapshot.check, Some(Side::Black));
    }

    #[test]
    fn test_resign_and_disconnect() {
        let mut session = new_session();
        let outcome = session.resign(WHITE).unwrap();
        assert_eq!(outcome.status, GameStatus::Resigned);
        assert_eq!(outcome.winner, Some(Side::Black));
        assert_eq!(session.resign(BLACK), Err(ChessError::GameOver));
        assert_eq!(session.disconnect(BLACK), Err(ChessError::GameOver));

        let mut session = new_session();
        assert_eq!(session.disconnect(99), Err(ChessError::NotAParticipant));
        let outcome = session.disconnect(BLACK).unwrap();
        assert_eq!(outcome.status, GameStatus::Disconnected);
        assert_eq!(outcome.winner, Some(Side::White));
        assert_eq!(outcome.reason, GameOverReason::OpponentLeft);
        assert_eq!(
            session.apply_move(WHITE, sq("e2"), sq("e4"), None),
            Err(ChessError::GameOver)
        );
    }

    #[test]
    fn test_missing_king_keeps_game_active() {
        let state = Fen::parse("8/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        let mut session = GameSession::from_state(
            4,
            Identity::new(WHITE, "alice"),
            Identity::new(BLACK, "bob"),
            state,
        );

        let snapshot = session.apply_move(WHITE, sq("e2"), sq("e4"), None).unwrap();

        assert_eq!(snapshot.status, GameStatus::Active);
        assert_eq!(snapshot.winner, None);
        assert_eq!(snapshot.check, None);
        assert!(session.outcome().is_none());
        assert_eq!(session.turn(), Side::Black);

        // 仍可认输结束
        let outcome = session.resign(BLACK).unwrap();
        assert_eq!(outcome.winner, Some(Side::White));
    }

    #[test]
    fn test_legal_moves_for() {
        let session = new_session();

        let moves = session.legal_moves_for(WHITE, sq("b1")).unwrap();
        assert_eq!(moves.len(), 2);

        // 不是自己的回合或不是自己的棋子
        assert!(session.legal_moves_for(BLACK, sq("b8")).unwrap().is_empty());
        assert!(session.legal_moves_for(WHITE, sq("b8")).unwrap().is_empty());
        assert_eq!(
            session.legal_moves_for(99, sq("b1")),
            Err(ChessError::NotAParticipant)
        );
    }
}
