// ws_transport_utils/src/message.rs

//! 定义 WebSocket 通信中使用的核心消息联合类型。
//!
//! 线上协议是扁平 JSON：每条文本帧都是一个带必填 `type` 字段的对象。
//! 本模块把这种动态的 `type` 字符串分发在边界处一次性地收敛为两个显式的
//! 带标签联合类型：
//!
//! - [`DeviceMessage`]：设备 → 服务端方向的入站消息。未识别的 `type`
//!   不会落入某个兜底字符串比较分支，而是成为具名的
//!   [`DeviceMessage::Unknown`] 变体，由路由层穷尽匹配处理。
//!   需要原样转发的消息（告警、配置、指令结果等）保留完整的
//!   `serde_json::Value` 信封，转发时不丢失任何未知字段。
//! - [`ServerMessage`]：服务端 → 设备方向的出站消息，借助 serde 的
//!   内部标签表示直接序列化出 `type` 字段。
//!
//! 二进制帧不属于本模块的范围：协议约定二进制帧始终是来自摄像头端的
//! 原始照片字节，服务端不会尝试把二进制帧当作 JSON 解析。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WsError;
use common_models::ws_payloads::{
    self,
    CommandResponsePayload,
    ErrorPayload,
    EspStatusPayload,
    ImageDataPayload,
    PingPayload,
    PongPayload,
    RegisterPayload,
    RegisteredPayload,
    TurnOnLightPayload,
};

/// 设备 → 服务端方向的入站消息联合类型。
///
/// 由 [`DeviceMessage::decode`] 在连接边界处一次性解码得到；
/// 此后服务端内部不再接触原始 JSON 文本。
#[derive(Debug, Clone)]
pub enum DeviceMessage {
    /// 注册消息：连接上第一条被接受的消息，必须把连接绑定到一个设备角色。
    Register(RegisterPayload),
    /// 心跳请求。
    Ping(PingPayload),
    /// 移动告警。保留完整信封以便原样转发给控制端。
    Alert(Value),
    /// 网络配置下发。保留完整信封以便原样转发给摄像头端与执行端。
    NetworkConfig(Value),
    /// 安防配置下发。保留完整信封以便原样转发给摄像头端与执行端。
    SecurityConfig(Value),
    /// 拍照指令。保留完整信封以便原样转发给摄像头端。
    CaptureRequest(Value),
    /// 设备端指令执行结果。保留完整信封以便原样转发给控制端。
    CommandResponse(Value),
    /// Base64 编码的图像数据。在照片处理前由服务端解码为二进制。
    ImageData(ImageDataPayload),
    /// 未识别的消息类型。保留原始 `type` 取值用于日志与错误回复。
    Unknown {
        /// 原始消息中 `type` 字段的取值。
        message_type: String,
    },
}

impl DeviceMessage {
    /// 把一条文本帧解码为 `DeviceMessage`。
    ///
    /// 解码失败（不是合法 JSON、不是对象、缺失 `type` 字段、负载字段类型
    /// 不匹配）时返回 [`WsError::DeserializationError`]；调用方应向对端回复
    /// 一条通用错误消息并保持连接。未识别的 `type` 不算解码失败，
    /// 而是得到 [`DeviceMessage::Unknown`]。
    pub fn decode(text: &str) -> Result<DeviceMessage, WsError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| WsError::DeserializationError(format!("文本帧不是合法 JSON: {}", e)))?;
        let message_type = value
            .as_object()
            .and_then(|obj| obj.get("type"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                WsError::DeserializationError("消息对象缺失字符串类型的 type 字段".to_string())
            })?
            .to_string();

        let message = match message_type.as_str() {
            ws_payloads::REGISTER_MESSAGE_TYPE => {
                let payload: RegisterPayload = serde_json::from_value(value).map_err(|e| {
                    WsError::DeserializationError(format!("注册消息负载解析失败: {}", e))
                })?;
                DeviceMessage::Register(payload)
            }
            ws_payloads::PING_MESSAGE_TYPE => DeviceMessage::Ping(PingPayload {}),
            ws_payloads::ALERT_MESSAGE_TYPE => DeviceMessage::Alert(value),
            ws_payloads::NETWORK_CONFIG_MESSAGE_TYPE => DeviceMessage::NetworkConfig(value),
            ws_payloads::SECURITY_CONFIG_MESSAGE_TYPE => DeviceMessage::SecurityConfig(value),
            ws_payloads::CAPTURE_REQUEST_MESSAGE_TYPE => DeviceMessage::CaptureRequest(value),
            ws_payloads::COMMAND_RESPONSE_MESSAGE_TYPE => DeviceMessage::CommandResponse(value),
            ws_payloads::IMAGE_DATA_MESSAGE_TYPE => {
                let payload: ImageDataPayload = serde_json::from_value(value).map_err(|e| {
                    WsError::DeserializationError(format!("图像数据消息负载解析失败: {}", e))
                })?;
                DeviceMessage::ImageData(payload)
            }
            other => DeviceMessage::Unknown {
                message_type: other.to_string(),
            },
        };
        Ok(message)
    }

    /// 把消息编码回线上 JSON 文本。主要供客户端（设备模拟端、集成测试）构造消息使用。
    pub fn encode(&self) -> Result<String, WsError> {
        fn envelope<T: Serialize>(message_type: &str, payload: &T) -> Result<String, WsError> {
            let mut value = serde_json::to_value(payload)
                .map_err(|e| WsError::SerializationError(format!("消息负载序列化失败: {}", e)))?;
            match value.as_object_mut() {
                Some(obj) => {
                    obj.insert("type".to_string(), Value::String(message_type.to_string()));
                }
                None => {
                    return Err(WsError::SerializationError(
                        "消息负载必须序列化为 JSON 对象".to_string(),
                    ));
                }
            }
            serde_json::to_string(&value)
                .map_err(|e| WsError::SerializationError(format!("消息信封序列化失败: {}", e)))
        }

        match self {
            DeviceMessage::Register(payload) => envelope(ws_payloads::REGISTER_MESSAGE_TYPE, payload),
            DeviceMessage::Ping(payload) => envelope(ws_payloads::PING_MESSAGE_TYPE, payload),
            DeviceMessage::Alert(value) => envelope(ws_payloads::ALERT_MESSAGE_TYPE, value),
            DeviceMessage::NetworkConfig(value) => envelope(ws_payloads::NETWORK_CONFIG_MESSAGE_TYPE, value),
            DeviceMessage::SecurityConfig(value) => envelope(ws_payloads::SECURITY_CONFIG_MESSAGE_TYPE, value),
            DeviceMessage::CaptureRequest(value) => envelope(ws_payloads::CAPTURE_REQUEST_MESSAGE_TYPE, value),
            DeviceMessage::CommandResponse(value) => envelope(ws_payloads::COMMAND_RESPONSE_MESSAGE_TYPE, value),
            DeviceMessage::ImageData(payload) => envelope(ws_payloads::IMAGE_DATA_MESSAGE_TYPE, payload),
            DeviceMessage::Unknown { message_type } => {
                envelope(message_type, &serde_json::Map::new())
            }
        }
    }

    /// 返回该消息的 `type` 字段取值，用于日志记录。
    pub fn message_type(&self) -> &str {
        match self {
            DeviceMessage::Register(_) => ws_payloads::REGISTER_MESSAGE_TYPE,
            DeviceMessage::Ping(_) => ws_payloads::PING_MESSAGE_TYPE,
            DeviceMessage::Alert(_) => ws_payloads::ALERT_MESSAGE_TYPE,
            DeviceMessage::NetworkConfig(_) => ws_payloads::NETWORK_CONFIG_MESSAGE_TYPE,
            DeviceMessage::SecurityConfig(_) => ws_payloads::SECURITY_CONFIG_MESSAGE_TYPE,
            DeviceMessage::CaptureRequest(_) => ws_payloads::CAPTURE_REQUEST_MESSAGE_TYPE,
            DeviceMessage::CommandResponse(_) => ws_payloads::COMMAND_RESPONSE_MESSAGE_TYPE,
            DeviceMessage::ImageData(_) => ws_payloads::IMAGE_DATA_MESSAGE_TYPE,
            DeviceMessage::Unknown { message_type } => message_type,
        }
    }
}

/// 服务端 → 设备方向的出站消息联合类型。
///
/// 通过 serde 的内部标签表示（`type` 字段）直接映射到线上 JSON，
/// 例如 `ServerMessage::Pong(PongPayload {})` 序列化为 `{"type":"pong"}`。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 注册成功确认。
    Registered(RegisteredPayload),
    /// 错误回复。
    Error(ErrorPayload),
    /// 心跳响应。
    Pong(PongPayload),
    /// 指令受理回执 / 执行结果。
    CommandResponse(CommandResponsePayload),
    /// 设备连接状态快照。
    EspStatus(EspStatusPayload),
    /// 隐式开灯指令。
    TurnOnLight(TurnOnLightPayload),
}

impl ServerMessage {
    /// 构造一条错误回复消息。
    pub fn error(message: impl Into<String>) -> ServerMessage {
        ServerMessage::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// 把消息编码为线上 JSON 文本。
    pub fn encode(&self) -> Result<String, WsError> {
        serde_json::to_string(self)
            .map_err(|e| WsError::SerializationError(format!("服务端消息序列化失败: {}", e)))
    }

    /// 把一条文本帧解码为 `ServerMessage`。主要供客户端（集成测试）解析服务端回复使用。
    pub fn decode(text: &str) -> Result<ServerMessage, WsError> {
        serde_json::from_str(text).map_err(|e| {
            WsError::DeserializationError(format!(
                "服务端消息反序列化失败: {}, 原始文本: '{}'",
                e, text
            ))
        })
    }
}
