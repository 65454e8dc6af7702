// ws_transport_utils/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! 本模块 (`client`) 及其子模块（例如 `transport`）提供 `ws_transport_utils` 库中
//! 与 WebSocket 客户端（设备侧）功能相关的组件和逻辑。
//!
//! 主要职责包括：
//! - **连接建立**: 解析服务器 URL 并完成 WebSocket 握手。
//! - **消息收发**: 以线上协议的消息类型（JSON 信封、二进制照片帧）为单位
//!   进行发送与接收，屏蔽底层 WebSocket 帧类型的细节。
//!
//! 平台上真正的设备端（手机控制端、ESP32 摄像头端与执行端）并不使用本模块；
//! 它服务于集成测试以及未来可能的 Rust 版设备模拟端。

pub mod transport; // 公开 transport 子模块，其中包含了主要的客户端传输层逻辑
