//! 服务端配置
//!
//! 从环境变量读取：
//! - `HOST` / `PORT`：监听地址
//! - `CHESS_RATING_DB`：积分文件路径
//! - `CHESS_HEARTBEAT_TIMEOUT_SECS`：读超时（秒）

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use protocol::{NetworkConfig, HEARTBEAT_TIMEOUT};

/// 每个连接的发送缓冲区大小
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

/// 服务端配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    /// 积分文件路径，未设置时使用数据目录下的默认路径
    pub rating_store_path: Option<PathBuf>,
    pub outbound_buffer: usize,
    /// 超过该时间未收到任何消息视为断线
    pub heartbeat_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            rating_store_path: None,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// 从进程环境变量读取
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.network.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.network.port = port
                .parse()
                .with_context(|| format!("无效的端口: {}", port))?;
        }
        if let Some(path) = lookup("CHESS_RATING_DB") {
            config.rating_store_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = lookup("CHESS_HEARTBEAT_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("无效的心跳超时: {}", secs))?;
            if secs == 0 {
                anyhow::bail!("心跳超时必须大于 0");
            }
            config.heartbeat_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// 实际使用的积分文件路径
    pub fn rating_file(&self) -> Option<PathBuf> {
        self.rating_store_path.clone().or_else(default_rating_store_path)
    }
}

/// 默认积分文件路径
fn default_rating_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("chess-server").join("ratings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.network, NetworkConfig::default());
        assert_eq!(config.heartbeat_timeout, HEARTBEAT_TIMEOUT);
        assert!(config.rating_store_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "7000"),
            ("CHESS_RATING_DB", "/tmp/ratings.json"),
            ("CHESS_HEARTBEAT_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.network.bind_addr(), "0.0.0.0:7000");
        assert_eq!(config.rating_file(), Some(PathBuf::from("/tmp/ratings.json")));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        assert!(ServerConfig::from_lookup(lookup(&[("PORT", "abc")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("CHESS_HEARTBEAT_TIMEOUT_SECS", "0")])).is_err());
    }
}
