//! 变化事件的通知扇出
//!
//! 对一次变化事件，把同一条消息投递给每个订阅者，逐个投递、逐个捕获
//! 失败：单个投递失败只记日志，不影响其余订阅者，也不重试。

use crate::models::{LoginChange, Watcher};
use crate::providers::{discord, Notifier};

/// 渲染一次变化事件的通知文本
pub fn render_message(change: &LoginChange) -> String {
    format!(
        "{} logged into Hypixel (last login updated {}).",
        change.player.display_name,
        discord::relative_timestamp(change.current_ms)
    )
}

/// 把变化事件投递给全部订阅者，返回成功投递的数量
pub async fn dispatch_change(
    notifier: &dyn Notifier,
    change: &LoginChange,
    watchers: &[Watcher],
) -> usize {
    let message = render_message(change);
    let mut delivered = 0;
    for watcher in watchers {
        match notifier
            .deliver(&watcher.channel_id, &watcher.user_id, &message)
            .await
        {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::warn!(
                    "[DISPATCH] 投递 {} 的变化到 {}/{} 失败: {}",
                    change.player.display_name,
                    watcher.channel_id,
                    watcher.user_id,
                    e
                );
            }
        }
    }
    tracing::info!(
        "[DISPATCH] {} 登录变化: {} -> {}，通知 {}/{} 个订阅者",
        change.player.display_name,
        change.previous_ms,
        change.current_ms,
        delivered,
        watchers.len()
    );
    delivered
}
