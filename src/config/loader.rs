//! 配置加载
//!
//! 从 YAML 文件读取配置，环境变量覆盖敏感项，最后做启动前校验。
//! 配置文件缺失不致命（使用默认值并告警），解析失败则拒绝启动。

use super::types::{Config, MIN_POLL_SECONDS};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置错误类型
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置读取失败: {0}")]
    Read(String),
    #[error("配置解析失败: {0}")]
    Parse(String),
    #[error("配置无效: {0}")]
    Invalid(String),
}

/// 缺省的配置文件位置
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playerwatch")
        .join("config.yaml")
}

/// 加载并校验配置
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    let mut config = if path.exists() {
        let content =
            std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
    } else {
        tracing::warn!(
            "[CONFIG] 配置文件 {} 不存在，使用默认配置",
            path.display()
        );
        Config::default()
    };

    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

/// 环境变量覆盖：敏感项优先取环境变量
fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var("HYPIXEL_API_KEY") {
        if !key.is_empty() {
            config.hypixel.api_key = key;
        }
    }
    if let Ok(token) = std::env::var("DISCORD_BOT_TOKEN") {
        if !token.is_empty() {
            config.discord.bot_token = token;
        }
    }
    if let Ok(secs) = std::env::var("POLL_SECONDS") {
        match secs.parse::<u64>() {
            Ok(secs) => config.poll_seconds = secs,
            Err(_) => tracing::warn!("[CONFIG] 环境变量 POLL_SECONDS={} 不是数字，忽略", secs),
        }
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.hypixel.api_key.is_empty() {
        return Err(ConfigError::Invalid(
            "hypixel.api_key 未配置（也可通过环境变量 HYPIXEL_API_KEY 提供）".to_string(),
        ));
    }
    if config.discord.bot_token.is_empty() {
        return Err(ConfigError::Invalid(
            "discord.bot_token 未配置（也可通过环境变量 DISCORD_BOT_TOKEN 提供）".to_string(),
        ));
    }
    if config.poll_seconds < MIN_POLL_SECONDS {
        tracing::warn!(
            "[CONFIG] poll_seconds={} 低于下限，按 {}s 执行",
            config.poll_seconds,
            MIN_POLL_SECONDS
        );
    }
    Ok(())
}
