//! 协议常量定义

use std::time::Duration;

/// 协议版本号
pub const PROTOCOL_VERSION: u8 = 1;

/// 棋盘边长（8x8）
pub const BOARD_SIZE: usize = 8;

/// 显示名最大长度
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 服务端心跳超时（秒）- 超过此时间无消息则视为断线
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 30;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 胜负结算时的等级分变化
pub const RATING_DELTA: i32 = 15;

/// 新用户初始等级分
pub const INITIAL_RATING: i32 = 1200;

/// 等级分下限
pub const MIN_RATING: i32 = 100;

/// 等级分上限
pub const MAX_RATING: i32 = 3000;

/// 心跳超时 Duration
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(HEARTBEAT_TIMEOUT_SECS);

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
