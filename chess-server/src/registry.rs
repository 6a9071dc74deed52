//! 对局注册表

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use protocol::{GameId, Identity, PlayerId};

use crate::session::GameSession;

/// 注册表错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("玩家 {player} 已在对局 {game_id} 中")]
    AlreadyInGame { player: PlayerId, game_id: GameId },

    #[error("玩家 {0} 不能与自己对局")]
    SamePlayer(PlayerId),
}

/// 对局注册表
///
/// 同一身份同时最多只有一局进行中的对局。
pub struct SessionRegistry {
    sessions: HashMap<GameId, GameSession>,
    /// 玩家 ID -> 对局 ID
    by_player: HashMap<PlayerId, GameId>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            by_player: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// 生成新的对局 ID
    fn generate_id(&self) -> GameId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 创建对局
    pub fn create(&mut self, white: Identity, black: Identity) -> Result<GameId, RegistryError> {
        if white.id == black.id {
            return Err(RegistryError::SamePlayer(white.id));
        }
        for player in [white.id, black.id] {
            if let Some(game_id) = self.find_by_player(player) {
                return Err(RegistryError::AlreadyInGame { player, game_id });
            }
        }

        let id = self.generate_id();
        self.by_player.insert(white.id, id);
        self.by_player.insert(black.id, id);
        self.sessions.insert(id, GameSession::new(id, white, black));
        Ok(id)
    }

    /// 获取对局
    pub fn get(&self, game_id: GameId) -> Option<&GameSession> {
        self.sessions.get(&game_id)
    }

    /// 获取对局（可变）
    pub fn get_mut(&mut self, game_id: GameId) -> Option<&mut GameSession> {
        self.sessions.get_mut(&game_id)
    }

    /// 查找玩家正在进行的对局
    pub fn find_by_player(&self, player_id: PlayerId) -> Option<GameId> {
        let game_id = *self.by_player.get(&player_id)?;
        self.sessions
            .get(&game_id)
            .filter(|s| s.is_active())
            .map(|s| s.id)
    }

    /// 移除对局
    pub fn remove(&mut self, game_id: GameId) -> Option<GameSession> {
        let session = self.sessions.remove(&game_id)?;
        for player in session.player_ids() {
            if self.by_player.get(&player) == Some(&game_id) {
                self.by_player.remove(&player);
            }
        }
        Some(session)
    }

    /// 对局数量
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new(1, "alice")
    }

    fn bob() -> Identity {
        Identity::new(2, "bob")
    }

    #[test]
    fn test_create_session() {
        let mut registry = SessionRegistry::new();

        let id = registry.create(alice(), bob()).unwrap();
        let session = registry.get(id).unwrap();

        assert_eq!(session.white.id, 1);
        assert_eq!(session.black.id, 2);
        assert!(session.is_active());
        assert_eq!(registry.find_by_player(1), Some(id));
        assert_eq!(registry.find_by_player(2), Some(id));
        assert_eq!(registry.find_by_player(3), None);
    }

    #[test]
    fn test_one_active_session_per_player() {
        let mut registry = SessionRegistry::new();

        let id = registry.create(alice(), bob()).unwrap();
        let result = registry.create(Identity::new(3, "carol"), alice());
        assert_eq!(result, Err(RegistryError::AlreadyInGame { player: 1, game_id: id }));

        assert_eq!(
            registry.create(alice(), alice()),
            Err(RegistryError::SamePlayer(1))
        );
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_finished_session_frees_players() {
        let mut registry = SessionRegistry::new();

        let id = registry.create(alice(), bob()).unwrap();
        registry.get_mut(id).unwrap().resign(1).unwrap();

        // 终局后即使尚未移除，也不再算作进行中
        assert_eq!(registry.find_by_player(1), None);

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(registry.get(id).is_none());

        let next = registry.create(bob(), alice()).unwrap();
        assert_ne!(next, id);
        assert_eq!(registry.find_by_player(1), Some(next));
    }
}
