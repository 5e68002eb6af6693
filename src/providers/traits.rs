//! 外部协作方接口
//!
//! 核心逻辑只依赖这三个 trait：名称解析、登录时间抓取、通知投递。
//! 具体实现（Mojang/PlayerDB/Hypixel/Discord）都在同级模块中。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// 名称解析错误
#[derive(Debug, Error)]
pub enum ResolveError {
    /// 玩家名不存在
    #[error("玩家不存在: {0}")]
    NotFound(String),
    /// 请求失败（网络、超时、响应异常）
    #[error("名称解析请求失败: {0}")]
    Network(String),
}

/// 登录时间抓取错误
///
/// 所有变体都按瞬时失败处理：当轮跳过该玩家，不影响其他玩家。
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("请求超时")]
    Timeout,
    #[error("数据不可用: {0}")]
    Unavailable(String),
    #[error("请求失败: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// 通知投递错误
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// 没有向目标频道发消息的权限
    #[error("没有向频道 {0} 发送消息的权限")]
    Forbidden(String),
    #[error("投递失败: {0}")]
    Failed(String),
}

/// 一次抓取到的登录快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoginSnapshot {
    /// 远端报告的最后登录时间（epoch 毫秒）
    pub last_login_ms: i64,
    /// 抓取完成时间
    pub fetched_at: DateTime<Utc>,
}

/// 玩家名 -> 稳定 uuid
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<String, ResolveError>;
}

/// 稳定 uuid -> 当前登录快照
#[async_trait]
pub trait LoginFetcher: Send + Sync {
    async fn fetch_last_login(&self, uuid: &str) -> Result<LoginSnapshot, FetchError>;
}

/// 把一条消息投递给某频道中的某用户
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &str,
    ) -> Result<(), DeliveryError>;
}
