//! playerwatch 守护进程入口
//!
//! 加载配置、装配协作方、启动对账轮询和管理接口，等待退出信号。

use anyhow::Context;
use playerwatch::config;
use playerwatch::providers::{
    DiscordNotifier, HypixelFetcher, MojangResolver, PlayerDbResolver, ResolverChain,
};
use playerwatch::server::{self, ServerContext};
use playerwatch::{ReconcileLoop, SubscriptionStore, TrackerService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn init_tracing(level: &str) {
    let level = match level {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref()).context("加载配置失败")?;
    init_tracing(&config.logging.level);

    tracing::info!(
        "[启动] playerwatch v{}，轮询周期 {}s",
        env!("CARGO_PKG_VERSION"),
        config.effective_poll_interval().as_secs()
    );

    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(config.user_agent.clone())
        .build()
        .context("构建 HTTP 客户端失败")?;

    let store = Arc::new(SubscriptionStore::load(config.storage_file()));
    let resolver = Arc::new(ResolverChain::new(vec![
        Arc::new(MojangResolver::new(client.clone())),
        Arc::new(PlayerDbResolver::new(client.clone())),
    ]));
    let fetcher = Arc::new(HypixelFetcher::new(
        client.clone(),
        config.hypixel.api_key.clone(),
    ));
    let notifier = Arc::new(DiscordNotifier::new(
        client,
        config.discord.bot_token.clone(),
    ));
    let tracker = Arc::new(TrackerService::new(
        store.clone(),
        resolver,
        fetcher.clone(),
    ));

    let cancel = CancellationToken::new();

    let server_handle = if config.server.enabled {
        let ctx = Arc::new(ServerContext {
            tracker,
            store: store.clone(),
            fetcher: fetcher.clone(),
        });
        let host = config.server.host.clone();
        let port = config.server.port;
        let server_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server::serve(ctx, &host, port, server_cancel).await {
                tracing::error!("[SERVER] 管理接口异常退出: {}", e);
            }
        }))
    } else {
        None
    };

    let reconcile_handle = tokio::spawn(
        ReconcileLoop::new(
            store,
            fetcher,
            notifier,
            config.effective_poll_interval(),
            cancel.clone(),
        )
        .run(),
    );

    tokio::signal::ctrl_c()
        .await
        .context("等待退出信号失败")?;
    tracing::info!("[关闭] 收到退出信号，等待当前轮询结束");
    cancel.cancel();

    let _ = reconcile_handle.await;
    if let Some(handle) = server_handle {
        let _ = handle.await;
    }
    tracing::info!("[关闭] playerwatch 已退出");
    Ok(())
}
