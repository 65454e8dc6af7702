//! `common_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了宠物安防汇聚平台各个 Rust 组件（云端汇聚服务器 `hubserver`、
//! WebSocket 传输工具库 `ws_transport_utils`，以及潜在的 Rust 版设备模拟端）之间
//! 共享的核心数据结构和枚举类型。
//!
//! 主要包含以下类型的模型：
//! - **WebSocket 消息负载 (`ws_payloads`)**: 设备与服务端之间通过 WebSocket 通信时
//!   传输的各类消息的 Payload 结构体与消息类型常量，例如注册、心跳、告警、
//!   配置下发、拍照指令、图像数据、连接状态快照等。
//! - **通用枚举 (`enums`)**: 定义了平台中广泛使用的枚举类型，如设备角色
//!   (`DeviceRole`)，以保证类型安全和一致性。
//!
//! 设计原则：
//! - **共享性**: 所有在此 crate 中定义的模型都旨在被多个其他 crate 共享使用。
//! - **序列化/反序列化**: 所有模型（结构体和枚举）都必须派生 `serde::Serialize` 和
//!   `serde::Deserialize` traits，以便能够轻松地在 JSON 等格式之间进行转换，
//!   这对于与嵌入式设备和移动端的网络通信至关重要。
//! - **可调试性与克隆**: 所有模型也必须派生 `Debug` 和 `Clone` traits，
//!   以方便调试输出和创建副本。

// 声明并公开项目中的各个模块
pub mod enums;          // 项目中通用的枚举类型定义
pub mod ws_payloads;    // WebSocket 通信中使用的各种消息负载结构体
