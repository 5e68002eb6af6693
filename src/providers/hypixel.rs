//! Hypixel 登录时间抓取
//!
//! 调用 Hypixel v2 player 接口读取 `lastLogin`（epoch 毫秒）。
//! 首选 `API-Key` 请求头认证；遇到 403 时用查询参数认证再试一次，
//! 兼容部分网络环境下请求头被剥离的情况。

use super::traits::{FetchError, LoginFetcher, LoginSnapshot};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;

const HYPIXEL_PLAYER_URL: &str = "https://api.hypixel.net/v2/player";
const HYPIXEL_KEY_URL: &str = "https://api.hypixel.net/v2/key";

pub struct HypixelFetcher {
    client: Client,
    api_key: String,
}

impl HypixelFetcher {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    /// 校验 API key 是否可用，返回持有者描述
    pub async fn check_key(&self) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(HYPIXEL_KEY_URL)
            .header("API-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        match resp.status().as_u16() {
            200 => {
                let data: serde_json::Value = resp.json().await?;
                if !data["success"].as_bool().unwrap_or(true) {
                    return Err(FetchError::Unavailable("key 校验未通过".to_string()));
                }
                let owner = data["record"]["owner"]
                    .as_str()
                    .or_else(|| data["record"]["ownerUuid"].as_str())
                    .unwrap_or("unknown")
                    .to_string();
                Ok(owner)
            }
            403 => Err(FetchError::Unavailable(
                "API key 无效、被禁用或 IP 被拦截".to_string(),
            )),
            status => Err(FetchError::Unavailable(format!(
                "key 校验返回状态 {status}"
            ))),
        }
    }

    fn parse_last_login(data: &serde_json::Value) -> Result<i64, FetchError> {
        if !data["success"].as_bool().unwrap_or(true) {
            return Err(FetchError::Unavailable(format!(
                "Hypixel API 返回错误: {}",
                data["cause"].as_str().unwrap_or("unknown")
            )));
        }
        let player = &data["player"];
        if player.is_null() {
            return Err(FetchError::Unavailable("玩家数据不存在".to_string()));
        }
        // 玩家可以在隐私设置里隐藏 lastLogin，此时字段缺失
        player["lastLogin"]
            .as_i64()
            .ok_or_else(|| FetchError::Unavailable("lastLogin 不可见".to_string()))
    }
}

#[async_trait]
impl LoginFetcher for HypixelFetcher {
    async fn fetch_last_login(&self, uuid: &str) -> Result<LoginSnapshot, FetchError> {
        let url = format!("{HYPIXEL_PLAYER_URL}?uuid={uuid}");
        let resp = self
            .client
            .get(&url)
            .header("API-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let data: serde_json::Value = if resp.status().as_u16() == 403 {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(
                "[HYPIXEL] 请求头认证被拒 (403)，改用查询参数重试: {}",
                body.chars().take(200).collect::<String>()
            );
            let alt_url = format!("{HYPIXEL_PLAYER_URL}?uuid={uuid}&key={}", self.api_key);
            let alt = self
                .client
                .get(&alt_url)
                .header("Accept", "application/json")
                .send()
                .await?;
            if !alt.status().is_success() {
                return Err(FetchError::Unavailable(format!(
                    "Hypixel API 返回状态 {}",
                    alt.status().as_u16()
                )));
            }
            alt.json().await?
        } else if !resp.status().is_success() {
            return Err(FetchError::Unavailable(format!(
                "Hypixel API 返回状态 {}",
                resp.status().as_u16()
            )));
        } else {
            resp.json().await?
        };

        let last_login_ms = Self::parse_last_login(&data)?;
        Ok(LoginSnapshot {
            last_login_ms,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_last_login_present() {
        let data = serde_json::json!({
            "success": true,
            "player": { "lastLogin": 1_704_067_200_000i64 }
        });
        assert_eq!(
            HypixelFetcher::parse_last_login(&data).unwrap(),
            1_704_067_200_000
        );
    }

    #[test]
    fn test_parse_last_login_hidden() {
        let data = serde_json::json!({
            "success": true,
            "player": { "displayname": "Alice" }
        });
        assert!(matches!(
            HypixelFetcher::parse_last_login(&data),
            Err(FetchError::Unavailable(_))
        ));
    }

    #[test]
    fn test_parse_missing_player() {
        let data = serde_json::json!({ "success": true, "player": null });
        assert!(matches!(
            HypixelFetcher::parse_last_login(&data),
            Err(FetchError::Unavailable(_))
        ));
    }

    #[test]
    fn test_parse_api_error() {
        let data = serde_json::json!({ "success": false, "cause": "Invalid API key" });
        match HypixelFetcher::parse_last_login(&data) {
            Err(FetchError::Unavailable(msg)) => assert!(msg.contains("Invalid API key")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
