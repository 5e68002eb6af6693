//! HTTP 管理接口
//!
//! 面向运行中守护进程的订阅管理入口：track / untrack / list，外加
//! 健康检查和 Hypixel key 诊断。全部变更都经由核心服务执行，这里只做
//! 传输层的映射。

use crate::providers::{HypixelFetcher, ResolveError};
use crate::services::tracker::{TrackError, TrackerService};
use crate::storage::SubscriptionStore;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 各 handler 共享的服务句柄
pub struct ServerContext {
    pub tracker: Arc<TrackerService>,
    pub store: Arc<SubscriptionStore>,
    pub fetcher: Arc<HypixelFetcher>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionRequest {
    channel_id: String,
    user_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct WatcherRequest {
    channel_id: String,
    user_id: String,
}

#[derive(Debug, Serialize)]
struct TrackResponse {
    uuid: String,
    display_name: String,
    created: bool,
}

fn error_body(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": message.into() }))
}

async fn health(State(ctx): State<Arc<ServerContext>>) -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "tracked_players": ctx.store.tracked_count(),
    }))
    .into_response()
}

async fn check_key(State(ctx): State<Arc<ServerContext>>) -> Response {
    match ctx.fetcher.check_key().await {
        Ok(owner) => Json(serde_json::json!({ "valid": true, "owner": owner })).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "valid": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn track(
    State(ctx): State<Arc<ServerContext>>,
    Json(req): Json<SubscriptionRequest>,
) -> Response {
    match ctx
        .tracker
        .track(&req.channel_id, &req.user_id, &req.name)
        .await
    {
        Ok((player, created)) => Json(TrackResponse {
            uuid: player.uuid,
            display_name: player.display_name,
            created,
        })
        .into_response(),
        Err(TrackError::Resolve(ResolveError::NotFound(name))) => (
            StatusCode::NOT_FOUND,
            error_body(format!("玩家不存在: {name}")),
        )
            .into_response(),
        Err(TrackError::Resolve(e)) => {
            (StatusCode::BAD_GATEWAY, error_body(e.to_string())).into_response()
        }
        Err(TrackError::Persistence(e)) => {
            tracing::error!("[SERVER] track 持久化失败: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response()
        }
    }
}

async fn untrack(
    State(ctx): State<Arc<ServerContext>>,
    Json(req): Json<SubscriptionRequest>,
) -> Response {
    match ctx.tracker.untrack(&req.channel_id, &req.user_id, &req.name) {
        Ok(removed) => Json(serde_json::json!({ "removed": removed })).into_response(),
        Err(e) => {
            tracing::error!("[SERVER] untrack 持久化失败: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response()
        }
    }
}

async fn untrack_all(
    State(ctx): State<Arc<ServerContext>>,
    Json(req): Json<WatcherRequest>,
) -> Response {
    match ctx.tracker.untrack_all(&req.channel_id, &req.user_id) {
        Ok(removed) => Json(serde_json::json!({ "removed": removed })).into_response(),
        Err(e) => {
            tracing::error!("[SERVER] untrack_all 持久化失败: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response()
        }
    }
}

async fn list(
    State(ctx): State<Arc<ServerContext>>,
    Query(req): Query<WatcherRequest>,
) -> Response {
    let names = ctx.tracker.list(&req.channel_id, &req.user_id);
    Json(serde_json::json!({ "tracking": names })).into_response()
}

pub fn router(ctx: Arc<ServerContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/key/check", get(check_key))
        .route(
            "/api/subscriptions",
            post(track).delete(untrack).get(list),
        )
        .route("/api/subscriptions/all", delete(untrack_all))
        .with_state(ctx)
}

/// 启动管理接口，直到取消信号触发后优雅退出
pub async fn serve(
    ctx: Arc<ServerContext>,
    host: &str,
    port: u16,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: std::net::SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("[SERVER] 管理接口监听 {}", addr);

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await?;

    Ok(())
}
