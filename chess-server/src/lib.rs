//! 国际象棋裁判服务端
//!
//! 包含:
//! - 对局状态机与对局注册表
//! - 匹配队列
//! - 玩家目录
//! - 积分存储
//! - 消息处理与 TCP 前端

pub mod config;
pub mod matchmaking;
pub mod net;
pub mod player;
pub mod rating;
pub mod registry;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use matchmaking::{MatchmakingQueue, QueueTicket, WaitingEntry};
pub use player::{DirectoryError, Player, PlayerDirectory, PlayerStatus};
pub use rating::{JsonRatingStore, MemoryRatingStore, RatingStore};
pub use registry::{RegistryError, SessionRegistry};
pub use server::{MessageHandler, ServerState};
pub use session::{GameOutcome, GameSession};
