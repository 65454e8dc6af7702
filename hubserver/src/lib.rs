//! `hubserver` 服务端核心库。
//!
//! 本 Crate 是宠物安防汇聚平台的云端后端实现：一台在公网上运行的
//! WebSocket 汇聚服务器，把无法互相直连的三类设备端（手机控制端、
//! 摄像头端、执行端）桥接起来，负责指令、告警与照片负载的转发，
//! 并为暂时离线的角色缓存出站消息。
//!
//! 主要模块包括：
//! - `config`: 管理应用的配置信息加载与访问。
//! - `error`: 定义应用特定的错误类型。
//! - `ws_server`: 实现 WebSocket 服务端，处理设备连接、注册、消息路由、
//!   离线排队与连接状态广播。

pub mod config;
pub mod error;
pub mod ws_server;
