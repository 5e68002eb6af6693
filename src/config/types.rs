//! 配置类型定义
//!
//! 定义 PlayerWatch 的配置结构，全部字段带默认值，支持 YAML
//! 序列化/反序列化。配置只在启动时读取，运行中不重载。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 轮询周期下限（秒），避免对远端服务的滥用
pub const MIN_POLL_SECONDS: u64 = 10;

/// 顶层配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 轮询周期（秒），低于下限时被钳制
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,
    /// 追踪状态文件路径，缺省时落在数据目录下
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
    /// 对外请求使用的 User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub hypixel: HypixelConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_seconds: default_poll_seconds(),
            storage_path: None,
            user_agent: default_user_agent(),
            hypixel: HypixelConfig::default(),
            discord: DiscordConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 钳制后的有效轮询周期
    pub fn effective_poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_seconds.max(MIN_POLL_SECONDS))
    }

    /// 追踪状态文件的实际位置
    pub fn storage_file(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(default_storage_path)
    }
}

/// Hypixel API 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HypixelConfig {
    /// API key，也可通过环境变量 HYPIXEL_API_KEY 提供
    #[serde(default)]
    pub api_key: String,
}

/// Discord 投递配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiscordConfig {
    /// Bot token，也可通过环境变量 DISCORD_BOT_TOKEN 提供
    #[serde(default)]
    pub bot_token: String,
}

/// 管理接口配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 日志级别: trace/debug/info/warn/error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_poll_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("playerwatch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_server_enabled() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8460
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 缺省的追踪状态文件位置
pub fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playerwatch")
        .join("tracking.json")
}
