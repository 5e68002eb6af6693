//! 订阅存储
//!
//! 单写者语义的内存文档 + 每次变更后的原子落盘。所有变更操作在同一把锁内
//! 先在副本上执行，落盘成功后才提交到内存；落盘失败时整个变更回滚，
//! 内存与磁盘不会出现分歧。
//!
//! 落盘方式：序列化完整文档，写入同目录临时文件，fsync 后原子替换正式文件。
//! 启动时加载正式文件；文件缺失或无法解析时以空文档启动（记录警告，不致命）。

use crate::models::{ObservedLogin, PlayerRecord, StoreDocument, TrackedPlayer, Watcher};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(test)]
mod tests;

/// 持久化错误
///
/// 触发该错误的变更已回滚，调用方可以安全重试。
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("序列化追踪状态失败: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("写入追踪状态失败: {0}")]
    Write(#[from] std::io::Error),
}

/// 订阅存储
pub struct SubscriptionStore {
    path: PathBuf,
    inner: Mutex<StoreDocument>,
}

impl SubscriptionStore {
    /// 从正式文件加载存储；缺失或损坏的文件以空文档启动
    pub fn load(path: PathBuf) -> Self {
        let doc = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<StoreDocument>(&content) {
                Ok(mut doc) => {
                    let pruned = prune(&mut doc);
                    if pruned > 0 {
                        tracing::warn!(
                            "[STORE] 加载时清理了 {} 条无订阅引用的玩家记录",
                            pruned
                        );
                    }
                    doc
                }
                Err(e) => {
                    tracing::warn!(
                        "[STORE] 追踪文件 {} 无法解析，以空存储启动: {}",
                        path.display(),
                        e
                    );
                    StoreDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("[STORE] 追踪文件 {} 不存在，以空存储启动", path.display());
                StoreDocument::default()
            }
            Err(e) => {
                tracing::warn!(
                    "[STORE] 读取追踪文件 {} 失败，以空存储启动: {}",
                    path.display(),
                    e
                );
                StoreDocument::default()
            }
        };
        Self {
            path,
            inner: Mutex::new(doc),
        }
    }

    /// 在副本上执行变更，落盘成功后提交；文档无变化时不触盘
    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut StoreDocument) -> T,
    ) -> Result<T, PersistenceError> {
        let mut doc = self.inner.lock();
        let mut staged = doc.clone();
        let out = apply(&mut staged);
        if staged != *doc {
            persist_atomic(&self.path, &staged)?;
            *doc = staged;
        }
        Ok(out)
    }

    /// 登记一条订阅；同一 (频道, 用户, 玩家) 的重复订阅是无操作
    ///
    /// 返回玩家（含首次订阅时登记的展示名）以及本次是否新建了订阅。
    pub fn subscribe(
        &self,
        channel_id: &str,
        user_id: &str,
        uuid: &str,
        display_name: &str,
    ) -> Result<(TrackedPlayer, bool), PersistenceError> {
        self.mutate(|doc| {
            let record = doc
                .players
                .entry(uuid.to_string())
                .or_insert_with(|| PlayerRecord::new(display_name));
            let canonical = record.display_name.clone();
            let names = doc
                .channels
                .entry(channel_id.to_string())
                .or_default()
                .entry(user_id.to_string())
                .or_default();
            let created = if names.iter().any(|n| n.eq_ignore_ascii_case(&canonical)) {
                false
            } else {
                names.push(canonical.clone());
                true
            };
            let player = TrackedPlayer {
                uuid: uuid.to_string(),
                display_name: canonical,
            };
            (player, created)
        })
    }

    /// 移除一条订阅；玩家失去最后一条订阅时连同观测状态一起清理
    pub fn unsubscribe(
        &self,
        channel_id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<bool, PersistenceError> {
        self.mutate(|doc| {
            let Some(canonical) = doc
                .players
                .values()
                .find(|r| r.display_name.eq_ignore_ascii_case(name))
                .map(|r| r.display_name.clone())
            else {
                return false;
            };
            let removed;
            {
                let Some(users) = doc.channels.get_mut(channel_id) else {
                    return false;
                };
                let Some(names) = users.get_mut(user_id) else {
                    return false;
                };
                let before = names.len();
                names.retain(|n| !n.eq_ignore_ascii_case(&canonical));
                removed = names.len() != before;
            }
            if removed {
                prune(doc);
            }
            removed
        })
    }

    /// 移除某 (频道, 用户) 的全部订阅，返回被移除的玩家名
    pub fn unsubscribe_all(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<Vec<String>, PersistenceError> {
        self.mutate(|doc| {
            let removed = doc
                .channels
                .get_mut(channel_id)
                .and_then(|users| users.remove(user_id))
                .unwrap_or_default();
            if !removed.is_empty() {
                prune(doc);
            }
            removed
        })
    }

    /// 某 (频道, 用户) 追踪中的玩家名，按订阅顺序
    pub fn list(&self, channel_id: &str, user_id: &str) -> Vec<String> {
        let doc = self.inner.lock();
        doc.channels
            .get(channel_id)
            .and_then(|users| users.get(user_id))
            .cloned()
            .unwrap_or_default()
    }

    /// 按玩家名（大小写不敏感）查找已登记的 uuid
    pub fn player_id_by_name(&self, name: &str) -> Option<String> {
        let doc = self.inner.lock();
        doc.players
            .iter()
            .find(|(_, rec)| rec.display_name.eq_ignore_ascii_case(name))
            .map(|(uuid, _)| uuid.clone())
    }

    /// 当前被至少一条订阅引用的玩家快照
    pub fn distinct_players(&self) -> Vec<TrackedPlayer> {
        let doc = self.inner.lock();
        let referenced = referenced_names(&doc);
        doc.players
            .iter()
            .filter(|(_, rec)| referenced.contains(&rec.display_name.to_ascii_lowercase()))
            .map(|(uuid, rec)| TrackedPlayer {
                uuid: uuid.clone(),
                display_name: rec.display_name.clone(),
            })
            .collect()
    }

    /// 当前追踪中的玩家数量
    pub fn tracked_count(&self) -> usize {
        self.distinct_players().len()
    }

    /// 写入一次登录观测；玩家已被清理时返回 false 且不落盘
    pub fn record_observed(
        &self,
        uuid: &str,
        last_login_ms: i64,
        observed_at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        self.mutate(|doc| match doc.players.get_mut(uuid) {
            Some(rec) => {
                rec.last_login_ms = Some(last_login_ms);
                rec.observed_at = Some(observed_at);
                true
            }
            None => false,
        })
    }

    /// 玩家的最后观测状态；尚未观测过时为空
    pub fn get_observed(&self, uuid: &str) -> Option<ObservedLogin> {
        let doc = self.inner.lock();
        let rec = doc.players.get(uuid)?;
        match (rec.last_login_ms, rec.observed_at) {
            (Some(last_login_ms), Some(observed_at)) => Some(ObservedLogin {
                last_login_ms,
                observed_at,
            }),
            _ => None,
        }
    }

    /// 订阅了某玩家的全部 (频道, 用户) 对，每对至多出现一次
    pub fn watchers_for(&self, uuid: &str) -> Vec<Watcher> {
        let doc = self.inner.lock();
        let Some(rec) = doc.players.get(uuid) else {
            return Vec::new();
        };
        let canonical = rec.display_name.to_ascii_lowercase();
        let mut out = Vec::new();
        for (channel_id, users) in &doc.channels {
            for (user_id, names) in users {
                if names.iter().any(|n| n.to_ascii_lowercase() == canonical) {
                    out.push(Watcher {
                        channel_id: channel_id.clone(),
                        user_id: user_id.clone(),
                    });
                }
            }
        }
        out
    }
}

fn referenced_names(doc: &StoreDocument) -> BTreeSet<String> {
    let mut referenced = BTreeSet::new();
    for users in doc.channels.values() {
        for names in users.values() {
            for name in names {
                referenced.insert(name.to_ascii_lowercase());
            }
        }
    }
    referenced
}

/// 清理空容器和不再被任何订阅引用的玩家记录，返回清理的玩家数
fn prune(doc: &mut StoreDocument) -> usize {
    for users in doc.channels.values_mut() {
        users.retain(|_, names| !names.is_empty());
    }
    doc.channels.retain(|_, users| !users.is_empty());
    let referenced = referenced_names(doc);
    let before = doc.players.len();
    doc.players
        .retain(|_, rec| referenced.contains(&rec.display_name.to_ascii_lowercase()));
    before - doc.players.len()
}

/// 写临时文件并原子替换正式文件
fn persist_atomic(path: &Path, doc: &StoreDocument) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = tmp_path(path);
    let body = serde_json::to_vec_pretty(doc)?;
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&body)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
