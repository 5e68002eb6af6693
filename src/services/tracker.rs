//! 订阅编排服务
//!
//! 负责 track/untrack/list 请求的编排：名称解析在存储锁之外进行，
//! 同名并发 track 通过每名称一把锁 + 双重检查保证只解析一次。

use crate::providers::{IdentityResolver, LoginFetcher, ResolveError};
use crate::storage::{PersistenceError, SubscriptionStore};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::TrackedPlayer;

/// track 请求可能的失败
#[derive(Debug, Error)]
pub enum TrackError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub struct TrackerService {
    store: Arc<SubscriptionStore>,
    resolver: Arc<dyn IdentityResolver>,
    fetcher: Arc<dyn LoginFetcher>,
    /// 每玩家名一把锁，防止并发解析
    resolve_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TrackerService {
    pub fn new(
        store: Arc<SubscriptionStore>,
        resolver: Arc<dyn IdentityResolver>,
        fetcher: Arc<dyn LoginFetcher>,
    ) -> Self {
        Self {
            store,
            resolver,
            fetcher,
            resolve_locks: DashMap::new(),
        }
    }

    /// 开始追踪一个玩家
    ///
    /// 名称未解析过时先通过解析链取得 uuid；解析失败时不写入任何状态。
    /// 新订阅建立后尝试立即抓取一次登录时间作为静默的初始观测，
    /// 抓取失败留给下一轮轮询补齐。
    pub async fn track(
        &self,
        channel_id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<(TrackedPlayer, bool), TrackError> {
        let lock = self
            .resolve_locks
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // 双重检查：并发的 track 可能已经解析入库
        let uuid = match self.store.player_id_by_name(name) {
            Some(uuid) => uuid,
            None => self.resolver.resolve(name).await?,
        };

        let (player, created) = self.store.subscribe(channel_id, user_id, &uuid, name)?;
        if created {
            tracing::info!(
                "[TRACKER] {}/{} 开始追踪 {} ({})",
                channel_id,
                user_id,
                player.display_name,
                uuid
            );
        }

        if created && self.store.get_observed(&uuid).is_none() {
            match self.fetcher.fetch_last_login(&uuid).await {
                Ok(snapshot) => {
                    if let Err(e) =
                        self.store
                            .record_observed(&uuid, snapshot.last_login_ms, snapshot.fetched_at)
                    {
                        tracing::warn!("[TRACKER] 初始观测写入失败: {}", e);
                    }
                }
                Err(e) => {
                    tracing::debug!("[TRACKER] 初始观测抓取失败，等待下一轮: {}", e);
                }
            }
        }

        Ok((player, created))
    }

    /// 停止追踪一个玩家，返回是否确实移除了订阅
    pub fn untrack(
        &self,
        channel_id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<bool, PersistenceError> {
        let removed = self.store.unsubscribe(channel_id, user_id, name)?;
        if removed {
            tracing::info!("[TRACKER] {}/{} 停止追踪 {}", channel_id, user_id, name);
        }
        Ok(removed)
    }

    /// 移除某 (频道, 用户) 的全部订阅
    pub fn untrack_all(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<Vec<String>, PersistenceError> {
        let removed = self.store.unsubscribe_all(channel_id, user_id)?;
        if !removed.is_empty() {
            tracing::info!(
                "[TRACKER] {}/{} 停止追踪 {} 个玩家",
                channel_id,
                user_id,
                removed.len()
            );
        }
        Ok(removed)
    }

    /// 某 (频道, 用户) 追踪中的玩家名，按订阅顺序
    pub fn list(&self, channel_id: &str, user_id: &str) -> Vec<String> {
        self.store.list(channel_id, user_id)
    }
}
