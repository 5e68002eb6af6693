//! 追踪数据模型
//!
//! 定义订阅存储的持久化文档结构以及追踪/变化事件的内存类型。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 持久化文档的根结构
///
/// 按频道组织订阅关系，另外维护一份按玩家 uuid 索引的观测状态。
/// 整个文档在每次变更后整体写盘（临时文件 + 原子替换）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    /// channel_id -> user_id -> 追踪中的玩家名列表（保持订阅顺序）
    #[serde(default)]
    pub channels: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// 玩家 uuid -> 玩家记录
    #[serde(default)]
    pub players: BTreeMap<String, PlayerRecord>,
}

/// 单个被追踪玩家的持久化记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// 首次订阅时提供的玩家名拼写
    pub display_name: String,
    /// 最后一次观测到的登录时间（epoch 毫秒），首次成功抓取前为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_ms: Option<i64>,
    /// 观测写入时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl PlayerRecord {
    pub fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            last_login_ms: None,
            observed_at: None,
        }
    }
}

/// 追踪中的玩家（稳定 uuid + 展示名）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedPlayer {
    pub uuid: String,
    pub display_name: String,
}

/// 一次已记录的登录观测
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedLogin {
    pub last_login_ms: i64,
    pub observed_at: DateTime<Utc>,
}

/// 订阅者标识：通知投递到哪个频道、提醒哪个用户
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watcher {
    pub channel_id: String,
    pub user_id: String,
}

/// 检测到的登录变化事件
#[derive(Debug, Clone)]
pub struct LoginChange {
    pub player: TrackedPlayer,
    pub previous_ms: i64,
    pub current_ms: i64,
    pub detected_at: DateTime<Utc>,
}
