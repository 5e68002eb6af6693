//! Discord 通知投递
//!
//! 通过 Discord REST 接口向频道发送消息，内容里 @ 到订阅的用户。
//! 只允许 user 级别的 mention，避免消息文本触发 @everyone。

use super::traits::{DeliveryError, Notifier};
use async_trait::async_trait;
use reqwest::Client;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

pub struct DiscordNotifier {
    client: Client,
    bot_token: String,
}

impl DiscordNotifier {
    pub fn new(client: Client, bot_token: String) -> Self {
        Self { client, bot_token }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &str,
    ) -> Result<(), DeliveryError> {
        let url = format!("{DISCORD_API_BASE}/channels/{channel_id}/messages");
        let body = serde_json::json!({
            "content": format!("<@{user_id}> {message}"),
            "allowed_mentions": { "parse": ["users"] }
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Failed(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 403 {
            return Err(DeliveryError::Forbidden(channel_id.to_string()));
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Failed(format!(
            "Discord API 返回 {}: {}",
            status.as_u16(),
            body.chars().take(200).collect::<String>()
        )))
    }
}

/// Discord 的相对时间标记，客户端会渲染成"x 分钟前"
pub fn relative_timestamp(epoch_ms: i64) -> String {
    format!("<t:{}:R>", epoch_ms / 1000)
}
