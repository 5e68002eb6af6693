//! 解析器链
//!
//! 按顺序尝试多个名称解析源，第一个成功的结果生效；全部失败时返回
//! 最后一个错误。

use super::traits::{IdentityResolver, ResolveError};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ResolverChain {
    resolvers: Vec<Arc<dyn IdentityResolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Arc<dyn IdentityResolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl IdentityResolver for ResolverChain {
    async fn resolve(&self, name: &str) -> Result<String, ResolveError> {
        let mut last = ResolveError::NotFound(name.to_string());
        for resolver in &self.resolvers {
            match resolver.resolve(name).await {
                Ok(uuid) => return Ok(uuid),
                Err(e) => {
                    tracing::debug!("[RESOLVE] 解析 {} 失败，尝试下一个来源: {}", name, e);
                    last = e;
                }
            }
        }
        Err(last)
    }
}
