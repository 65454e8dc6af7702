//! `ws_transport_utils` 是一个提供 WebSocket 通信实用功能的 Rust Crate。
//! 它封装了宠物安防汇聚平台线上协议的消息编解码，以及设备侧（客户端）的
//! 连接与收发逻辑，特别关注与 `common_models` 一起使用时的消息处理和
//! 序列化/反序列化。
//!
//! 主要模块包括：
//! - `message`: 定义线上协议的消息联合类型 `DeviceMessage`（入站，设备 → 服务端）
//!   与 `ServerMessage`（出站，服务端 → 设备），以及一次性的边界解码逻辑。
//! - `error`: 定义库中使用的统一错误类型 `WsError`。
//! - `client`: 提供 WebSocket 客户端传输层，供集成测试与 Rust 版设备模拟端使用。

pub mod client;
pub mod error;
pub mod message;
