//! PlayerDB 后备解析
//!
//! Mojang 接口不可用时的第二解析源。返回的 uuid 带连字符，统一归一化为
//! 不带连字符的小写形式后再入库。

use super::traits::{IdentityResolver, ResolveError};
use async_trait::async_trait;
use reqwest::Client;

const PLAYERDB_URL: &str = "https://playerdb.co/api/player/minecraft";

pub struct PlayerDbResolver {
    client: Client,
}

impl PlayerDbResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityResolver for PlayerDbResolver {
    async fn resolve(&self, name: &str) -> Result<String, ResolveError> {
        let url = format!("{}/{}", PLAYERDB_URL, urlencoding::encode(name));
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ResolveError::Network(e.to_string()))?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ResolveError::Network(e.to_string()))?;

        if !status.is_success() || !data["success"].as_bool().unwrap_or(false) {
            return Err(ResolveError::NotFound(name.to_string()));
        }

        let dashed = data["data"]["player"]["id"]
            .as_str()
            .ok_or_else(|| ResolveError::Network("响应缺少玩家 id".to_string()))?;
        let uuid = uuid::Uuid::parse_str(dashed)
            .map_err(|e| ResolveError::Network(format!("uuid 格式异常 ({dashed}): {e}")))?;
        Ok(uuid.simple().to_string())
    }
}
