//! 订阅存储测试

use super::*;
use chrono::TimeZone;
use tempfile::tempdir;

const UUID_ALICE: &str = "abc123abc123abc123abc123abc123ab";
const UUID_BOB: &str = "def456def456def456def456def456de";

fn store_at(dir: &tempfile::TempDir) -> SubscriptionStore {
    SubscriptionStore::load(dir.path().join("tracking.json"))
}

fn ts(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

// ========== 订阅幂等性 ==========

#[test]
fn test_subscribe_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = store_at(&dir);

    let (player, created) = store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    assert!(created);
    assert_eq!(player.uuid, UUID_ALICE);
    assert_eq!(player.display_name, "Alice");

    let (_, created) = store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    assert!(!created);
    assert_eq!(store.list("C1", "U1"), vec!["Alice".to_string()]);
}

#[test]
fn test_subscribe_other_spelling_same_uuid_is_noop() {
    let dir = tempdir().unwrap();
    let store = store_at(&dir);

    store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    // 不同拼写解析到同一 uuid：保留首次拼写，不新建订阅
    let (player, created) = store.subscribe("C1", "U1", UUID_ALICE, "ALICE").unwrap();
    assert!(!created);
    assert_eq!(player.display_name, "Alice");
    assert_eq!(store.list("C1", "U1"), vec!["Alice".to_string()]);
    assert_eq!(store.watchers_for(UUID_ALICE).len(), 1);
}

#[test]
fn test_list_preserves_insertion_order() {
    let dir = tempdir().unwrap();
    let store = store_at(&dir);

    store.subscribe("C1", "U1", UUID_BOB, "Bob").unwrap();
    store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    assert_eq!(
        store.list("C1", "U1"),
        vec!["Bob".to_string(), "Alice".to_string()]
    );
}

// ========== 孤儿清理 ==========

#[test]
fn test_orphan_cleanup_after_last_unsubscribe() {
    let dir = tempdir().unwrap();
    let store = store_at(&dir);

    store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    store.subscribe("C2", "U2", UUID_ALICE, "Alice").unwrap();
    store
        .record_observed(UUID_ALICE, 1_000, ts(10))
        .unwrap();

    assert!(store.unsubscribe("C1", "U1", "Alice").unwrap());
    // 还有 C2/U2 的订阅，玩家与观测状态保留
    assert_eq!(store.distinct_players().len(), 1);
    assert!(store.get_observed(UUID_ALICE).is_some());

    assert!(store.unsubscribe("C2", "U2", "alice").unwrap());
    assert!(store.distinct_players().is_empty());
    assert!(store.get_observed(UUID_ALICE).is_none());
    assert!(store.player_id_by_name("Alice").is_none());
}

#[test]
fn test_unsubscribe_unknown_name_returns_false() {
    let dir = tempdir().unwrap();
    let store = store_at(&dir);

    store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    assert!(!store.unsubscribe("C1", "U1", "Bob").unwrap());
    assert!(!store.unsubscribe("C9", "U1", "Alice").unwrap());
    assert!(!store.unsubscribe("C1", "U9", "Alice").unwrap());
    assert_eq!(store.distinct_players().len(), 1);
}

#[test]
fn test_unsubscribe_all_removes_and_reports_names() {
    let dir = tempdir().unwrap();
    let store = store_at(&dir);

    store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    store.subscribe("C1", "U1", UUID_BOB, "Bob").unwrap();
    store.subscribe("C1", "U2", UUID_BOB, "Bob").unwrap();

    let removed = store.unsubscribe_all("C1", "U1").unwrap();
    assert_eq!(removed, vec!["Alice".to_string(), "Bob".to_string()]);
    assert!(store.list("C1", "U1").is_empty());

    // Bob 仍被 U2 追踪，Alice 被清理
    let remaining: Vec<String> = store
        .distinct_players()
        .into_iter()
        .map(|p| p.display_name)
        .collect();
    assert_eq!(remaining, vec!["Bob".to_string()]);

    assert!(store.unsubscribe_all("C1", "U1").unwrap().is_empty());
}

// ========== 观测状态 ==========

#[test]
fn test_record_observed_for_removed_player_is_noop() {
    let dir = tempdir().unwrap();
    let store = store_at(&dir);

    store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    store.unsubscribe("C1", "U1", "Alice").unwrap();

    assert!(!store.record_observed(UUID_ALICE, 1_000, ts(10)).unwrap());
    assert!(store.get_observed(UUID_ALICE).is_none());
}

#[test]
fn test_watchers_deduplicated_per_pair() {
    let dir = tempdir().unwrap();
    let store = store_at(&dir);

    store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    store.subscribe("C1", "U2", UUID_ALICE, "Alice").unwrap();
    store.subscribe("C2", "U1", UUID_ALICE, "Alice").unwrap();

    let watchers = store.watchers_for(UUID_ALICE);
    assert_eq!(watchers.len(), 3);
    let mut deduped = watchers.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), 3);
}

// ========== 持久化 ==========

#[test]
fn test_state_survives_reload() {
    let dir = tempdir().unwrap();
    {
        let store = store_at(&dir);
        store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
        store
            .record_observed(UUID_ALICE, 1_704_067_200_000, ts(100))
            .unwrap();
    }

    let store = store_at(&dir);
    assert_eq!(store.list("C1", "U1"), vec!["Alice".to_string()]);
    let observed = store.get_observed(UUID_ALICE).unwrap();
    assert_eq!(observed.last_login_ms, 1_704_067_200_000);
    assert_eq!(observed.observed_at, ts(100));
}

#[test]
fn test_corrupt_file_starts_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracking.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = SubscriptionStore::load(path);
    assert!(store.distinct_players().is_empty());
    // 存储仍然可用
    store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    assert_eq!(store.tracked_count(), 1);
}

#[test]
fn test_aborted_write_leaves_canonical_file_intact() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracking.json");
    {
        let store = SubscriptionStore::load(path.clone());
        store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    }
    let before = std::fs::read(&path).unwrap();

    // 模拟在 rename 之前崩溃：临时文件残留半成品内容
    std::fs::write(dir.path().join("tracking.json.tmp"), b"{\"channels\":{\"C").unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), before);
    let store = SubscriptionStore::load(path);
    assert_eq!(store.list("C1", "U1"), vec!["Alice".to_string()]);
}

#[test]
fn test_failed_persist_rolls_back_mutation() {
    let dir = tempdir().unwrap();
    // 让目标路径的父"目录"是一个普通文件，写入必然失败
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let store = SubscriptionStore::load(blocker.join("tracking.json"));

    let err = store.subscribe("C1", "U1", UUID_ALICE, "Alice");
    assert!(err.is_err());
    assert!(store.list("C1", "U1").is_empty());
    assert!(store.distinct_players().is_empty());
}

#[test]
fn test_noop_mutation_does_not_touch_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracking.json");
    let store = SubscriptionStore::load(path.clone());
    store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();

    // 重复订阅与未命中的退订都不应重写文件
    store.subscribe("C1", "U1", UUID_ALICE, "Alice").unwrap();
    assert!(!store.unsubscribe("C1", "U1", "Bob").unwrap());
    assert_eq!(
        std::fs::metadata(&path).unwrap().modified().unwrap(),
        mtime
    );
}

#[test]
fn test_load_prunes_unreferenced_players() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracking.json");
    // 手工构造一份带孤儿玩家记录的文档
    let doc = serde_json::json!({
        "channels": { "C1": { "U1": ["Alice"] } },
        "players": {
            UUID_ALICE: { "display_name": "Alice" },
            UUID_BOB: { "display_name": "Bob", "last_login_ms": 5 }
        }
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();

    let store = SubscriptionStore::load(path);
    let players: Vec<String> = store
        .distinct_players()
        .into_iter()
        .map(|p| p.display_name)
        .collect();
    assert_eq!(players, vec!["Alice".to_string()]);
    assert!(store.get_observed(UUID_BOB).is_none());
}

// ========== 随机操作序列下的不变量 ==========

mod properties {
    use super::*;
    use proptest::prelude::*;

    const CHANNELS: [&str; 2] = ["C1", "C2"];
    const USERS: [&str; 2] = ["U1", "U2"];
    const PLAYERS: [(&str, &str); 3] = [
        (super::UUID_ALICE, "Alice"),
        (super::UUID_BOB, "Bob"),
        ("0123456789abcdef0123456789abcdef", "Carol"),
    ];

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// 任意订阅/退订序列之后：每个被追踪的玩家都有至少一条订阅引用，
        /// 且全部退订后存储为空。
        #[test]
        fn tracked_players_always_referenced(
            ops in prop::collection::vec(
                (0usize..2, 0usize..2, 0usize..3, prop::bool::ANY),
                0..24,
            )
        ) {
            let dir = tempfile::tempdir().unwrap();
            let store = SubscriptionStore::load(dir.path().join("tracking.json"));

            for (ci, ui, pi, subscribe) in ops {
                let (uuid, name) = PLAYERS[pi];
                if subscribe {
                    store.subscribe(CHANNELS[ci], USERS[ui], uuid, name).unwrap();
                } else {
                    store.unsubscribe(CHANNELS[ci], USERS[ui], name).unwrap();
                }
                // 追踪中的玩家必须能按名字找回
                for player in store.distinct_players() {
                    prop_assert_eq!(
                        store.player_id_by_name(&player.display_name),
                        Some(player.uuid.clone())
                    );
                    prop_assert!(!store.watchers_for(&player.uuid).is_empty());
                }
            }

            for channel in CHANNELS {
                for user in USERS {
                    store.unsubscribe_all(channel, user).unwrap();
                }
            }
            prop_assert!(store.distinct_players().is_empty());
        }
    }
}
