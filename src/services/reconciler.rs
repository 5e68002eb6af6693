//! 对账轮询
//!
//! 固定周期的单任务轮询：每轮对全部被追踪玩家抓取当前登录时间，
//! 与已观测值比较，有变化时先落盘再通知。两轮之间不会重叠，慢抓取
//! 只会拉长实际周期。
//!
//! 关闭流程：收到取消信号后完成（或中断）当前这一轮；截止之后发现的
//! 变化不再产生通知。

use crate::providers::{LoginFetcher, Notifier};
use crate::services::dispatch;
use crate::storage::SubscriptionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::models::LoginChange;

pub struct ReconcileLoop {
    store: Arc<SubscriptionStore>,
    fetcher: Arc<dyn LoginFetcher>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    cancel: CancellationToken,
}

impl ReconcileLoop {
    pub fn new(
        store: Arc<SubscriptionStore>,
        fetcher: Arc<dyn LoginFetcher>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            interval,
            cancel,
        }
    }

    /// 运行轮询直到取消
    pub async fn run(self) {
        tracing::info!(
            "[RECONCILE] 轮询启动，周期 {}s",
            self.interval.as_secs()
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("[RECONCILE] 收到关闭信号，轮询退出");
                    return;
                }
                _ = ticker.tick() => {}
            }
            self.tick().await;
        }
    }

    /// 执行一轮对账
    pub(crate) async fn tick(&self) {
        let players = self.store.distinct_players();
        if players.is_empty() {
            return;
        }
        tracing::debug!("[RECONCILE] 本轮对账 {} 个玩家", players.len());

        for player in players {
            if self.cancel.is_cancelled() {
                tracing::info!("[RECONCILE] 本轮在关闭信号处中断");
                return;
            }

            // 单个玩家的抓取失败只跳过该玩家
            let snapshot = match self.fetcher.fetch_last_login(&player.uuid).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(
                        "[RECONCILE] 抓取 {} ({}) 失败，本轮跳过: {}",
                        player.display_name,
                        player.uuid,
                        e
                    );
                    continue;
                }
            };

            match self.store.get_observed(&player.uuid) {
                // 首次观测：静默入库，不产生通知
                None => {
                    if let Err(e) = self.store.record_observed(
                        &player.uuid,
                        snapshot.last_login_ms,
                        snapshot.fetched_at,
                    ) {
                        tracing::error!("[RECONCILE] 初始观测落盘失败: {}", e);
                    }
                }
                Some(prev) if prev.last_login_ms != snapshot.last_login_ms => {
                    // 先落盘再通知，落盘失败时不通知，留待下一轮重新检测
                    match self.store.record_observed(
                        &player.uuid,
                        snapshot.last_login_ms,
                        snapshot.fetched_at,
                    ) {
                        Ok(true) => {
                            if self.cancel.is_cancelled() {
                                tracing::info!("[RECONCILE] 关闭截止之后的变化不再通知");
                                return;
                            }
                            let change = LoginChange {
                                player: player.clone(),
                                previous_ms: prev.last_login_ms,
                                current_ms: snapshot.last_login_ms,
                                detected_at: snapshot.fetched_at,
                            };
                            let watchers = self.store.watchers_for(&player.uuid);
                            dispatch::dispatch_change(self.notifier.as_ref(), &change, &watchers)
                                .await;
                        }
                        // 快照与抓取之间订阅全部消失，没有要通知的人
                        Ok(false) => {}
                        Err(e) => {
                            tracing::error!(
                                "[RECONCILE] {} 的变化落盘失败，跳过通知: {}",
                                player.display_name,
                                e
                            );
                        }
                    }
                }
                // 值未变化：不落盘也不通知
                Some(_) => {}
            }
        }
    }
}
