// hubserver/src/ws_server/service.rs

//! WebSocket 服务端核心服务：监听、连接升级与每条连接的读写任务。
//!
//! 监听器同时承担探活职责：携带 WebSocket 升级头的请求在任意路径上都会
//! 被升级并交给 Hub；普通 HTTP 请求一律返回 200 与一段简短的在线说明
//! （托管平台的健康检查就靠它），`/health` 路径则是显式的探活端点。

use axum::{
    extract::{
        connect_info::ConnectInfo,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use ws_transport_utils::message::DeviceMessage;

use crate::config::WebSocketConfig;
use crate::error::AppError;

use super::client_session::ClientSession;
use super::event::{HubEvent, OutboundFrame};
use super::hub::HubHandle;

/// 普通 HTTP 请求得到的在线说明文本。
const LIVENESS_TEXT: &str = "WebSocket hub online";

/// 传给各个请求处理器的共享状态。
#[derive(Clone)]
struct AppState {
    hub: HubHandle,
    outbound_capacity: usize,
}

/// WebSocket 服务结构体，封装了配置和 Hub 句柄。
pub struct WsService {
    config: WebSocketConfig,
    hub: HubHandle,
}

impl WsService {
    /// 创建一个新的 WsService 实例。
    pub fn new(config: WebSocketConfig, hub: HubHandle) -> Self {
        info!("[WsService] New instance created.");
        Self { config, hub }
    }

    /// 绑定配置中的监听地址并启动服务。正常部署下此方法不会返回。
    pub async fn start(&self) -> Result<(), AppError> {
        let listen_addr = format!("{}:{}", self.config.host, self.config.port);
        info!("[WsService] Starting WebSocket service on {} ...", listen_addr);

        let listener = tokio::net::TcpListener::bind(&listen_addr).await.map_err(|e| {
            AppError::WebSocketService(format!("监听地址 {} 绑定失败: {}", listen_addr, e))
        })?;
        self.serve(listener).await
    }

    /// 在一个已绑定的监听器上运行服务。测试用例借助它在随机端口上启动服务。
    pub async fn serve(&self, listener: tokio::net::TcpListener) -> Result<(), AppError> {
        if let Ok(addr) = listener.local_addr() {
            info!("[WsService] WebSocket 服务器正在监听地址: {}", addr);
        }

        let state = AppState {
            hub: self.hub.clone(),
            outbound_capacity: self.config.outbound_channel_capacity,
        };
        let app = Router::new()
            .route("/health", get(health_handler))
            .fallback(root_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| AppError::WebSocketService(format!("WebSocket 服务运行失败: {}", e)))
    }
}

/// 显式探活端点。
async fn health_handler() -> &'static str {
    "OK"
}

/// 兜底处理器：WebSocket 升级请求交给 Hub，普通请求回复 200 在线说明。
async fn root_handler(
    ws: Option<WebSocketUpgrade>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    match ws {
        Some(upgrade) => {
            info!("[WsService] 来自 {} 的 WebSocket 升级请求。", addr);
            upgrade.on_upgrade(move |socket| handle_socket(socket, addr, state))
        }
        None => {
            debug!("[WsService] 来自 {} 的普通 HTTP 请求，回复在线说明。", addr);
            (StatusCode::OK, LIVENESS_TEXT).into_response()
        }
    }
}

/// 处理一条已升级的 WebSocket 连接：建立会话、派生写任务并运行读循环。
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(state.outbound_capacity);
    let session = ClientSession::new(addr, outbound_tx);
    let client_id = session.client_id;

    info!("[WsService] New client connected: SessionID={}, Addr={}", client_id, addr);

    if state.hub.dispatch(HubEvent::Connected { session }).await.is_err() {
        error!("[WsService] Hub 已停止，新连接 {} 被放弃。", client_id);
        return;
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // 写任务：把 Hub 推来的出站帧写到底层连接。
    // 出站通道被关闭（会话被 Hub 清理）或写失败时结束。
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            match frame {
                OutboundFrame::Text(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text)).await {
                        warn!("[SenderTask {}] Failed to send text frame: {}", client_id, e);
                        break;
                    }
                }
                OutboundFrame::Binary(data) => {
                    if let Err(e) = ws_sender.send(Message::Binary(data)).await {
                        warn!("[SenderTask {}] Failed to send binary frame: {}", client_id, e);
                        break;
                    }
                }
                OutboundFrame::Close { code, reason } => {
                    info!(
                        "[SenderTask {}] Closing connection: code={}, reason='{}'",
                        client_id, code, reason
                    );
                    let _ = ws_sender
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    return;
                }
            }
        }
        // 出站通道关闭而没有显式关闭帧：尽力发送一个默认关闭帧
        let _ = ws_sender.close().await;
        debug!("[SenderTask {}] Sender task ended.", client_id);
    });

    // 读循环：把到达的帧归一为 Hub 事件。解码在这里（连接边界）完成一次。
    while let Some(frame_result) = ws_receiver.next().await {
        match frame_result {
            Ok(Message::Text(text)) => {
                let event = match DeviceMessage::decode(&text) {
                    Ok(message) => HubEvent::EnvelopeReceived { client_id, message },
                    Err(e) => HubEvent::MalformedReceived {
                        client_id,
                        error: e.to_string(),
                    },
                };
                if state.hub.dispatch(event).await.is_err() {
                    break;
                }
            }
            Ok(Message::Binary(data)) => {
                if state
                    .hub
                    .dispatch(HubEvent::BinaryReceived { client_id, data })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Ping 由 axum 底层自动回应 Pong，应用层无须处理
            }
            Ok(Message::Close(close_frame)) => {
                info!(
                    "[WsService] SessionID {}: Client closed connection: {:?}",
                    client_id, close_frame
                );
                break;
            }
            Err(e) => {
                warn!(
                    "[WsService] SessionID {}: WebSocket receive error: {}. Connection likely broken.",
                    client_id, e
                );
                break;
            }
        }
    }

    // 读循环结束即视为连接关闭，通知 Hub 做清理
    if state
        .hub
        .dispatch(HubEvent::Disconnected { client_id })
        .await
        .is_err()
    {
        debug!("[WsService] Hub 已停止，连接 {} 的断开事件未投递。", client_id);
    }

    // 等待写任务结束，确保底层连接资源被释放
    if let Err(e) = sender_task.await {
        error!(
            "[WsService] SessionID {}: Sender task panicked or failed during join: {:?}",
            client_id, e
        );
    }
    info!("[WsService] SessionID {}: Connection handling finished.", client_id);
}
