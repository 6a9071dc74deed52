//! 匹配队列
//!
//! 先进先出，队首两人成对；先入队者执白。

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use protocol::{Identity, PlayerId};

/// 排队凭证
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueTicket(pub u64);

/// 排队中的玩家
#[derive(Debug, Clone)]
pub struct WaitingEntry {
    pub ticket: QueueTicket,
    pub identity: Identity,
    pub queued_at: DateTime<Utc>,
}

/// 匹配队列
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    entries: VecDeque<WaitingEntry>,
    next_ticket: u64,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入队列，已在队列中时返回原凭证
    pub fn join(&mut self, identity: Identity) -> QueueTicket {
        if let Some(entry) = self.entries.iter().find(|e| e.identity.id == identity.id) {
            return entry.ticket;
        }

        self.next_ticket += 1;
        let ticket = QueueTicket(self.next_ticket);
        self.entries.push_back(WaitingEntry {
            ticket,
            identity,
            queued_at: Utc::now(),
        });
        ticket
    }

    /// 按凭证取消排队
    pub fn cancel(&mut self, ticket: QueueTicket) -> Option<WaitingEntry> {
        let index = self.entries.iter().position(|e| e.ticket == ticket)?;
        self.entries.remove(index)
    }

    /// 取出队首两人 (白方, 黑方)
    pub fn pop_pair(&mut self) -> Option<(WaitingEntry, WaitingEntry)> {
        if self.entries.len() < 2 {
            return None;
        }
        let white = self.entries.pop_front()?;
        let black = self.entries.pop_front()?;
        Some((white, black))
    }

    /// 玩家在队列中的位置（从 0 开始）
    pub fn position(&self, player_id: PlayerId) -> Option<usize> {
        self.entries.iter().position(|e| e.identity.id == player_id)
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.position(player_id).is_some()
    }

    /// 排队人数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
