// hubserver/src/ws_server/mod.rs

//! WebSocket 服务端模块。
//!
//! 本模块实现汇聚服务器的核心：所有共享状态（连接注册表、离线队列、
//! 连接状态标志）都由唯一的 [`hub::Hub`] 值独占持有，并在单个异步任务中
//! 按顺序消费类型化的 [`event::HubEvent`] 事件流。连接 I/O 任务只通过
//! 事件通道与 Hub 交互，因此注册表与队列的每一次变更天然地
//! "一次只发生一件"，不需要额外的锁。
//!
//! 子模块一览：
//! - `service`: 监听器与每条连接的读写任务（axum WebSocket 升级、HTTP 探活）。
//! - `client_session`: 单条设备连接的会话状态。
//! - `connection_registry`: 角色 → 至多一条连接的注册表。
//! - `outbound_queue`: 目标角色离线时的照片/指令缓存队列。
//! - `status_broadcaster`: 设备连接状态快照的计算与推送。
//! - `registration_timer`: 强制连接在时限内完成注册的看门狗。
//! - `message_router`: 按 (消息类型, 发送方角色) 分发的路由逻辑。
//! - `event`: Hub 事件与出站帧的类型定义。
//! - `hub`: 事件循环本体。

pub mod client_session;
pub mod connection_registry;
pub mod event;
pub mod hub;
pub mod message_router;
pub mod outbound_queue;
pub mod registration_timer;
pub mod service;
pub mod status_broadcaster;
