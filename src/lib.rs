//! PlayerWatch - Hypixel 玩家登录追踪服务
//!
//! 轮询 Hypixel API，追踪玩家最后登录时间的变化，并向订阅的 Discord 频道推送通知。

// 核心模块
pub mod config;
pub mod models;
pub mod providers;
pub mod server;
pub mod services;
pub mod storage;

// 重新导出核心类型
pub use services::reconciler::ReconcileLoop;
pub use services::tracker::TrackerService;
pub use storage::SubscriptionStore;
