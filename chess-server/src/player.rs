//! 玩家管理

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use protocol::{GameId, Identity, PlayerId, MAX_DISPLAY_NAME_LEN};

use crate::matchmaking::QueueTicket;

/// 玩家状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// 在线，在大厅
    Lobby,
    /// 排队中
    Queued(QueueTicket),
    /// 对局中
    InGame(GameId),
}

/// 身份绑定错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("显示名不能为空")]
    EmptyDisplayName,

    #[error("显示名不能超过{0}个字符")]
    DisplayNameTooLong(usize),

    #[error("该身份已有连接")]
    AlreadyConnected,
}

/// 在线玩家
#[derive(Debug, Clone)]
pub struct Player {
    pub identity: Identity,
    pub status: PlayerStatus,
    pub connected_at: DateTime<Utc>,
}

/// 在线玩家目录
///
/// 身份由外部认证服务签发，这里只负责绑定与状态跟踪。
pub struct PlayerDirectory {
    players: HashMap<PlayerId, Player>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
        }
    }

    /// 验证显示名
    pub fn validate_display_name(name: &str) -> Result<(), DirectoryError> {
        if name.trim().is_empty() {
            return Err(DirectoryError::EmptyDisplayName);
        }
        if name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(DirectoryError::DisplayNameTooLong(MAX_DISPLAY_NAME_LEN));
        }
        Ok(())
    }

    /// 绑定身份
    pub fn connect(&mut self, identity: Identity) -> Result<(), DirectoryError> {
        Self::validate_display_name(&identity.display_name)?;
        if self.players.contains_key(&identity.id) {
            return Err(DirectoryError::AlreadyConnected);
        }

        self.players.insert(
            identity.id,
            Player {
                identity,
                status: PlayerStatus::Lobby,
                connected_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// 解除绑定
    pub fn disconnect(&mut self, player_id: PlayerId) -> Option<Player> {
        self.players.remove(&player_id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    /// 获取玩家身份
    pub fn identity(&self, player_id: PlayerId) -> Option<&Identity> {
        self.players.get(&player_id).map(|p| &p.identity)
    }

    /// 设置玩家状态
    pub fn set_status(&mut self, player_id: PlayerId, status: PlayerStatus) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.status = status;
        }
    }

    pub fn status(&self, player_id: PlayerId) -> Option<PlayerStatus> {
        self.players.get(&player_id).map(|p| p.status)
    }

    pub fn exists(&self, player_id: PlayerId) -> bool {
        self.players.contains_key(&player_id)
    }

    /// 获取在线玩家数量
    pub fn online_count(&self) -> usize {
        self.players.len()
    }
}

impl Default for PlayerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect() {
        let mut directory = PlayerDirectory::new();

        directory.connect(Identity::new(1, "玩家1")).unwrap();
        directory.connect(Identity::new(2, "玩家2")).unwrap();

        assert_eq!(directory.online_count(), 2);
        assert_eq!(directory.status(1), Some(PlayerStatus::Lobby));
        assert_eq!(directory.identity(2).map(|i| i.display_name.as_str()), Some("玩家2"));
    }

    #[test]
    fn test_duplicate_identity() {
        let mut directory = PlayerDirectory::new();

        directory.connect(Identity::new(1, "玩家1")).unwrap();
        assert_eq!(
            directory.connect(Identity::new(1, "别名")),
            Err(DirectoryError::AlreadyConnected)
        );
    }

    #[test]
    fn test_invalid_display_name() {
        let mut directory = PlayerDirectory::new();

        assert_eq!(
            directory.connect(Identity::new(1, "  ")),
            Err(DirectoryError::EmptyDisplayName)
        );
        let long_name = "a".repeat(MAX_DISPLAY_NAME_LEN + 1);
        assert!(directory.connect(Identity::new(1, long_name)).is_err());
        assert!(!directory.exists(1));
    }

    #[test]
    fn test_status_and_disconnect() {
        let mut directory = PlayerDirectory::new();

        directory.connect(Identity::new(1, "玩家1")).unwrap();
        directory.set_status(1, PlayerStatus::Queued(QueueTicket(3)));
        assert_eq!(directory.status(1), Some(PlayerStatus::Queued(QueueTicket(3))));

        directory.set_status(1, PlayerStatus::InGame(7));
        assert_eq!(directory.status(1), Some(PlayerStatus::InGame(7)));

        let player = directory.disconnect(1).unwrap();
        assert_eq!(player.status, PlayerStatus::InGame(7));
        assert!(!directory.exists(1));

        // 断开后可再次绑定
        directory.connect(Identity::new(1, "玩家1")).unwrap();
    }
}
