// common_models/src/ws_payloads.rs

//! 包含 WebSocket 通信中使用的各种 Payload 结构体定义与消息类型常量。
//!
//! 线上协议为扁平 JSON 对象：每条文本帧都是一个带有必填 `type` 字段的对象，
//! 其余字段即为该消息类型的负载。本模块中的结构体描述的是去掉 `type`
//! 字段之后的负载部分；`type` 字段的取值统一由下方的 `*_MESSAGE_TYPE`
//! 常量给出，供服务端路由与客户端构造消息时使用。
//!
//! 所有共享模型都必须派生 `Serialize`, `Deserialize`, `Debug`, `Clone`。

use serde::{Deserialize, Serialize};

/// 设备注册消息的 `type` 取值。
pub const REGISTER_MESSAGE_TYPE: &str = "register";
/// 注册成功确认消息的 `type` 取值。
pub const REGISTERED_MESSAGE_TYPE: &str = "registered";
/// 错误消息的 `type` 取值。
pub const ERROR_MESSAGE_TYPE: &str = "error";
/// 心跳请求消息的 `type` 取值。
pub const PING_MESSAGE_TYPE: &str = "ping";
/// 心跳响应消息的 `type` 取值。
pub const PONG_MESSAGE_TYPE: &str = "pong";
/// 移动告警消息的 `type` 取值（摄像头端/执行端 → 控制端）。
pub const ALERT_MESSAGE_TYPE: &str = "alert";
/// 网络配置下发消息的 `type` 取值（控制端 → 摄像头端与执行端）。
pub const NETWORK_CONFIG_MESSAGE_TYPE: &str = "network_config";
/// 安防配置下发消息的 `type` 取值（控制端 → 摄像头端与执行端）。
pub const SECURITY_CONFIG_MESSAGE_TYPE: &str = "security_config";
/// 拍照指令消息的 `type` 取值（控制端 → 摄像头端）。
pub const CAPTURE_REQUEST_MESSAGE_TYPE: &str = "capture_request";
/// 指令执行结果消息的 `type` 取值（摄像头端/执行端 → 控制端）。
pub const COMMAND_RESPONSE_MESSAGE_TYPE: &str = "command_response";
/// Base64 编码图像数据消息的 `type` 取值（摄像头端 → 服务端）。
pub const IMAGE_DATA_MESSAGE_TYPE: &str = "image_data";
/// 设备连接状态快照消息的 `type` 取值（服务端 → 控制端）。
pub const ESP_STATUS_MESSAGE_TYPE: &str = "esp_status";
/// 开灯指令消息的 `type` 取值（服务端 → 执行端）。
pub const TURN_ON_LIGHT_MESSAGE_TYPE: &str = "turn_on_light";

/// 设备注册消息的负载。
///
/// 每条连接上第一条被接受的消息必须是注册消息，`device` 字段取值为
/// `"controller"`、`"camera"` 或 `"actuator"` 之一（见 `enums::DeviceRole`）。
/// 字段缺失时按空串处理，服务端会将其视为未知设备并断开连接。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegisterPayload {
    /// 请求绑定的设备角色线上名称。
    #[serde(default)]
    pub device: String,
}

/// 注册成功确认消息的负载。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegisteredPayload {
    /// 人类可读的确认文本，固定为 "OK"。
    pub message: String,
}

/// 错误消息的负载。错误文本面向人类阅读，不参与机器解析。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorPayload {
    /// 错误描述文本。
    pub message: String,
}

/// 心跳请求消息的负载。当前为空，保留结构体以便未来扩展。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PingPayload {}

/// 心跳响应消息的负载。当前为空。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PongPayload {}

/// 移动告警消息的负载。
///
/// 由摄像头端或执行端上报，服务端原样转发给控制端（控制端离线时不排队），
/// 并同时向执行端下发一条隐式的开灯指令。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AlertPayload {
    /// 告警描述文本。
    pub message: String,
}

/// 指令执行结果消息的负载。
///
/// 既用于服务端对控制端指令的受理回执，也用于设备端上报的执行结果转发。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CommandResponsePayload {
    /// 指令是否已被受理/执行成功。
    pub success: bool,
    /// 人类可读的结果说明。
    pub message: String,
}

/// Base64 编码图像数据消息的负载。
///
/// 摄像头端除原始二进制帧之外的另一种照片上报途径：`data` 字段为照片
/// 字节的 Base64 编码。服务端在边界处解码为二进制后，按与二进制帧完全
/// 相同的照片流程处理。`success` 为 `false` 或 `data` 无法解码时视为
/// 无效图像数据。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageDataPayload {
    /// 照片字节的 Base64 编码文本。
    #[serde(default)]
    pub data: String,
    /// 触发来源说明（如 "motion"、"manual"），可选。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    /// 摄像头端的拍摄是否成功。
    #[serde(default)]
    pub success: bool,
}

/// 设备连接状态快照消息的负载。
///
/// 由服务端在每次注册成功以及摄像头端/执行端断开后重新计算并推送，
/// 仅在控制端当前在线时发送，从不排队补发。
/// `connected` 字段与 `camera` 取值相同，为兼容旧版控制端而保留。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EspStatusPayload {
    /// 摄像头端当前是否在线。
    pub camera: bool,
    /// 执行端当前是否在线。
    pub actuator: bool,
    /// 兼容字段，取值等于 `camera`。
    pub connected: bool,
}

/// 开灯指令消息的负载。当前为空：指令本身没有参数。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TurnOnLightPayload {}
