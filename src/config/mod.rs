//! 配置管理模块
//!
//! 提供 YAML 配置文件支持与环境变量覆盖；配置只在启动时消费一次。

mod loader;
mod types;

pub use loader::{default_config_path, load_config, ConfigError};
pub use types::{
    default_storage_path, Config, DiscordConfig, HypixelConfig, LoggingConfig, ServerConfig,
    MIN_POLL_SECONDS,
};
