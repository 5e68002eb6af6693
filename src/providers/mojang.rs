//! Mojang 名称解析
//!
//! 通过 Mojang 官方 profile 接口把玩家名解析为不带连字符的小写 uuid。

use super::traits::{IdentityResolver, ResolveError};
use async_trait::async_trait;
use reqwest::Client;

const MOJANG_PROFILE_URL: &str = "https://api.mojang.com/users/profiles/minecraft";

pub struct MojangResolver {
    client: Client,
}

impl MojangResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityResolver for MojangResolver {
    async fn resolve(&self, name: &str) -> Result<String, ResolveError> {
        let url = format!("{}/{}", MOJANG_PROFILE_URL, urlencoding::encode(name));
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ResolveError::Network(e.to_string()))?;

        match resp.status().as_u16() {
            200 => {
                let data: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| ResolveError::Network(e.to_string()))?;
                // Mojang 返回的 id 是 32 位不带连字符的十六进制串
                let raw = data
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ResolveError::Network("响应缺少 id 字段".to_string()))?;
                if raw.len() != 32 {
                    return Err(ResolveError::Network(format!(
                        "响应中的 id 格式异常: {raw}"
                    )));
                }
                Ok(raw.to_ascii_lowercase())
            }
            204 | 404 => Err(ResolveError::NotFound(name.to_string())),
            status => {
                tracing::warn!("[MOJANG] 解析 {} 返回状态 {}", name, status);
                Err(ResolveError::Network(format!("Mojang API 返回 {status}")))
            }
        }
    }
}
