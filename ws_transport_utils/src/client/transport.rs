// ws_transport_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层核心逻辑。
//!
//! 本模块提供了 `ws_transport_utils` 库中用于客户端 WebSocket 通信的主要功能。
//! 它包括建立与服务器的连接、发送结构化的 [`DeviceMessage`] 与二进制照片帧，
//! 以及把接收到的底层 WebSocket 帧归一为 [`ClientEvent`] 的抽象。
//! 其设计旨在简化集成测试与设备模拟端与汇聚服务器的异步交互。

use log::{debug, error, info};
use tokio_tungstenite::{
    connect_async,
    WebSocketStream,
    tungstenite::protocol::Message,
    tungstenite::Error as TungsteniteError,
};
use url::Url;

use crate::error::WsError;
use crate::message::DeviceMessage;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt,
    StreamExt,
};

/// `ClientWsStream` 类型别名，代表一个可能经过 TLS 加密的 TCP WebSocket 流。
/// 这是 `tokio-tungstenite` 库在客户端连接成功后返回的典型流类型。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 从服务端收到的一次接收事件，已归一到线上协议的粒度。
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// 一条文本帧，已解析为 JSON 值。
    Json(serde_json::Value),
    /// 一条二进制帧（照片字节）。
    Binary(Vec<u8>),
    /// 服务端发来的关闭帧。`code`/`reason` 在对端未附带关闭信息时为 `None`。
    Closed {
        /// 关闭码（例如 1000）。
        code: Option<u16>,
        /// 人类可读的关闭原因文本。
        reason: Option<String>,
    },
}

/// `ClientConnection` 结构体代表一个活动的客户端 WebSocket 连接。
///
/// 它封装了与服务器进行通信所需的发送端 (`SplitSink`) 和接收端 (`SplitStream`)。
/// 实例通常在成功连接到服务器后创建。
pub struct ClientConnection {
    /// 用于向 WebSocket 服务器异步发送消息的 `Sink` (发送端)。
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    /// 用于从 WebSocket 服务器异步接收消息的 `Stream` (接收端)。
    /// (字段设为 `pub` 以便在测试和某些外部高级用法中直接访问)。
    pub ws_receiver: SplitStream<ClientWsStream>,
}

impl ClientConnection {
    /// 异步向服务器发送一条 [`DeviceMessage`]（编码为 JSON 文本帧）。
    pub async fn send_device_message(&mut self, message: &DeviceMessage) -> Result<(), WsError> {
        let msg_json = message.encode()?;
        debug!("客户端：准备发送消息: {}", msg_json);
        self.ws_sender.send(Message::Text(msg_json)).await?;
        info!("客户端：消息已成功发送 (类型: {})", message.message_type());
        Ok(())
    }

    /// 异步向服务器发送一条原始文本帧。供需要构造畸形消息的测试使用。
    pub async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        debug!("客户端：准备发送原始文本帧: {}", text);
        self.ws_sender.send(Message::Text(text)).await?;
        Ok(())
    }

    /// 异步向服务器发送一条二进制帧（照片字节）。
    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), WsError> {
        debug!("客户端：准备发送二进制帧，长度: {} 字节", data.len());
        self.ws_sender.send(Message::Binary(data)).await?;
        Ok(())
    }

    /// 主动关闭连接（发送关闭帧）。
    pub async fn close(&mut self) -> Result<(), WsError> {
        self.ws_sender.send(Message::Close(None)).await?;
        Ok(())
    }
}

/// 异步连接到指定的 WebSocket 服务器。
///
/// 此函数尝试解析给定的 URL 字符串，然后使用 `tokio-tungstenite` 的 `connect_async`
/// 方法建立与服务器的 WebSocket 连接。如果连接和握手成功，它会将返回的
/// `WebSocketStream` 分割成发送端和接收端，并封装在 `ClientConnection` 结构体中返回。
///
/// # Arguments
/// * `url_str` - WebSocket 服务器的完整 URL 字符串 (例如 "ws://127.0.0.1:8080")。
///
/// # Returns
/// * `Result<ClientConnection, WsError>` - 如果连接成功建立并完成握手，则返回包含
///   发送和接收端的 `ClientConnection` 实例。如果 URL 解析失败、连接失败或
///   WebSocket 握手过程中发生错误，则返回相应的 `WsError`。
pub async fn connect_client(url_str: String) -> Result<ClientConnection, WsError> {
    info!("客户端：开始尝试连接到 WebSocket 服务器，URL: {}", url_str);
    // 解析 URL 字符串
    let parsed_url = Url::parse(&url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;

    // 异步连接到服务器
    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            // 连接成功
            info!("客户端：已成功连接到 {} (HTTP 状态码: {})", url_str, response.status());
            debug!("客户端：WebSocket 连接响应头: {:?}", response.headers());
            // 将 WebSocket 流分割为独立的发送端和接收端
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            // 连接失败
            error!("客户端：连接到 {} 失败，错误: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// 从给定的 WebSocket 接收流 (`SplitStream`) 中异步接收一次 [`ClientEvent`]。
///
/// 此函数处理单个传入的 WebSocket 消息事件。它会跳过非业务相关的控制帧
/// （如 Ping、Pong，这些通常由底层库自动处理）。文本帧被解析为 JSON 值，
/// 二进制帧原样返回，关闭帧连同其关闭码与原因文本一起作为
/// [`ClientEvent::Closed`] 返回一次，之后流耗尽时返回 `None`。
///
/// **注意：** 此函数设计为处理单个事件的接收。在一个持续的客户端会话中，
/// 调用方通常需要在一个循环中重复调用此函数来处理所有传入的消息。
///
/// # Returns
/// * `Option<Result<ClientEvent, WsError>>`:
///     - `Some(Ok(event))`：成功接收并归一了一个事件。
///     - `Some(Err(ws_error))`：接收或解析过程中发生错误（例如文本帧不是合法 JSON）。
///     - `None`：WebSocket 流已结束。
pub async fn receive_event(
    ws_receiver: &mut SplitStream<ClientWsStream>,
) -> Option<Result<ClientEvent, WsError>> {
    // 这个内部循环主要用于处理和跳过那些不直接映射到应用层事件的底层
    // WebSocket 控制帧，例如 Ping/Pong（由 tokio-tungstenite 自动处理）。
    loop {
        match ws_receiver.next().await {
            Some(msg_result) => match msg_result {
                Ok(msg) => match msg {
                    Message::Text(text) => {
                        debug!("客户端：收到原始文本消息，内容: '{}'", text);
                        break Some(serde_json::from_str::<serde_json::Value>(&text).map(ClientEvent::Json).map_err(
                            |e| {
                                WsError::DeserializationError(format!(
                                    "收到的文本消息不是合法 JSON: {}, 原始文本: '{}'",
                                    e, text
                                ))
                            },
                        ));
                    }
                    Message::Binary(bin) => {
                        debug!("客户端：收到二进制消息，长度: {} 字节", bin.len());
                        break Some(Ok(ClientEvent::Binary(bin)));
                    }
                    Message::Ping(ping_data) => {
                        // Ping 帧通常由 tokio-tungstenite 库自动响应 Pong，应用层无需特殊处理
                        debug!("客户端：收到 Ping 控制帧，数据: {:?}. (通常由底层库自动处理)", ping_data);
                    }
                    Message::Pong(pong_data) => {
                        debug!("客户端：收到 Pong 控制帧，数据: {:?}", pong_data);
                    }
                    Message::Close(close_frame) => {
                        // 收到 Close 帧，表示连接正在关闭或已被对方关闭。
                        // 把关闭码与原因归一为一次 Closed 事件交给调用方断言。
                        debug!("客户端：收到 Close 控制帧，详细信息: {:?}", close_frame);
                        let (code, reason) = match close_frame {
                            Some(frame) => (Some(u16::from(frame.code)), Some(frame.reason.to_string())),
                            None => (None, None),
                        };
                        break Some(Ok(ClientEvent::Closed { code, reason }));
                    }
                    Message::Frame(_) => {
                        // Frame 是一个更底层的原始帧类型，通常不应在应用层面直接处理
                        debug!("客户端：收到一个非预期的底层原始 Frame 类型消息，正在跳过。");
                    }
                },
                Err(e) => match e {
                    TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed => {
                        debug!("客户端：连接已关闭 (在 ws_receiver.next() 期间检测到)。");
                        break None;
                    }
                    _ => {
                        error!("客户端：从 WebSocket 流接收消息时发生底层错误: {}", e);
                        break Some(Err(WsError::WebSocketProtocolError(e)));
                    }
                },
            },
            None => {
                // 流已经完全耗尽 (通常也意味着连接已关闭)
                debug!("客户端：WebSocket 接收流已结束 (ws_receiver.next() 返回 None)。");
                break None;
            }
        }
    }
}
