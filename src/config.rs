//! 跟踪器配置 - 通过JSON文件调整参数

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::tracking::DEFAULT_HISTORY_SIZE;

/// 会话跟踪参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // === 平滑参数 ===
    pub history_size: usize, // 每个 track 的投票窗口 (帧)

    // === 会话清理参数 ===
    pub cleanup_interval_secs: u64, // 清理周期 (秒)
    pub session_timeout_secs: u64,  // 会话超时 (秒)
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            cleanup_interval_secs: 60,
            session_timeout_secs: 300,
        }
    }
}

impl TrackerConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// 参数合法性检查
    pub fn validate(&self) -> Result<()> {
        if self.history_size == 0 {
            return Err(TrackerError::config("history_size must be > 0"));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(TrackerError::config("cleanup_interval_secs must be > 0"));
        }
        if self.session_timeout_secs == 0 {
            return Err(TrackerError::config("session_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// 从JSON文件加载配置 (缺省字段使用默认值)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        log::info!("✅ 配置已从 {} 加载", path.display());
        Ok(config)
    }

    /// 加载配置, 文件不存在时写出默认配置
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        log::info!("📝 配置文件不存在,创建默认配置...");
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        log::info!("🎛️  当前跟踪配置:");
        log::info!("  平滑窗口: {} 帧", self.history_size);
        log::info!("  清理周期: {} 秒", self.cleanup_interval_secs);
        log::info!("  会话超时: {} 秒", self.session_timeout_secs);
    }
}
