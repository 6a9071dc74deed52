//! 积分存储
//!
//! 对局结束后只调用 `adjust_rating`，服务端不读取积分。

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use protocol::{PlayerId, INITIAL_RATING, MAX_RATING, MIN_RATING};

use crate::config::ServerConfig;

/// 积分存储接口
pub trait RatingStore: Send + Sync {
    /// 调整积分，返回调整后的值
    fn adjust_rating(&mut self, user_id: PlayerId, delta: i32) -> Result<i32>;
}

/// 把积分限制在合法范围内
pub fn clamp_rating(rating: i32) -> i32 {
    rating.clamp(MIN_RATING, MAX_RATING)
}

/// 内存积分表
#[derive(Debug, Default)]
pub struct MemoryRatingStore {
    ratings: HashMap<PlayerId, i32>,
}

impl MemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询积分（未记录过的玩家返回初始积分）
    pub fn rating(&self, user_id: PlayerId) -> i32 {
        self.ratings.get(&user_id).copied().unwrap_or(INITIAL_RATING)
    }
}

impl RatingStore for MemoryRatingStore {
    fn adjust_rating(&mut self, user_id: PlayerId, delta: i32) -> Result<i32> {
        let rating = self.ratings.entry(user_id).or_insert(INITIAL_RATING);
        *rating = clamp_rating(rating.saturating_add(delta));
        Ok(*rating)
    }
}

/// JSON 文件积分表
///
/// 每次调整后整体写回文件。
pub struct JsonRatingStore {
    path: PathBuf,
    ratings: BTreeMap<PlayerId, i32>,
}

impl JsonRatingStore {
    /// 打开积分文件，不存在时创建空表
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("无法创建积分目录: {:?}", parent))?;
            }
        }

        let ratings = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("读取积分文件失败: {:?}", path))?;
            serde_json::from_str(&content).context("解析积分文件失败")?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, ratings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rating(&self, user_id: PlayerId) -> i32 {
        self.ratings.get(&user_id).copied().unwrap_or(INITIAL_RATING)
    }

    fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.ratings).context("序列化积分失败")?;
        fs::write(&self.path, content)
            .with_context(|| format!("写入积分文件失败: {:?}", self.path))
    }
}

impl RatingStore for JsonRatingStore {
    fn adjust_rating(&mut self, user_id: PlayerId, delta: i32) -> Result<i32> {
        let previous = self.rating(user_id);
        let rating = clamp_rating(previous.saturating_add(delta));
        self.ratings.insert(user_id, rating);

        if let Err(e) = self.save() {
            // 写盘失败时回滚内存中的值
            self.ratings.insert(user_id, previous);
            return Err(e);
        }
        Ok(rating)
    }
}

/// 根据配置打开积分存储
///
/// 未配置路径且无法获取数据目录时退回内存存储。
pub fn open_rating_store(config: &ServerConfig) -> Result<Box<dyn RatingStore>> {
    match config.rating_file() {
        Some(path) => {
            info!(path = ?path, "使用 JSON 积分文件");
            Ok(Box::new(JsonRatingStore::open(path)?))
        }
        None => {
            warn!("无法获取数据目录，积分只保存在内存中");
            Ok(Box::new(MemoryRatingStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryRatingStore::new();

        assert_eq!(store.rating(1), INITIAL_RATING);
        assert_eq!(store.adjust_rating(1, 15).unwrap(), INITIAL_RATING + 15);
        assert_eq!(store.adjust_rating(2, -15).unwrap(), INITIAL_RATING - 15);
        assert_eq!(store.rating(1), INITIAL_RATING + 15);
    }

    #[test]
    fn test_rating_is_clamped() {
        let mut store = MemoryRatingStore::new();

        assert_eq!(store.adjust_rating(1, -5000).unwrap(), MIN_RATING);
        assert_eq!(store.adjust_rating(1, i32::MAX).unwrap(), MAX_RATING);
        assert_eq!(clamp_rating(1500), 1500);
    }

    #[test]
    fn test_json_store_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("ratings.json");

        {
            let mut store = JsonRatingStore::open(&path).unwrap();
            store.adjust_rating(7, 15).unwrap();
            store.adjust_rating(8, -15).unwrap();
            store.adjust_rating(7, 15).unwrap();
        }
        assert!(path.exists());

        let store = JsonRatingStore::open(&path).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert_eq!(store.rating(7), INITIAL_RATING + 30);
        assert_eq!(store.rating(8), INITIAL_RATING - 15);
        assert_eq!(store.rating(9), INITIAL_RATING);
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ratings.json");
        fs::write(&path, "not json").unwrap();

        assert!(JsonRatingStore::open(&path).is_err());
    }
}
