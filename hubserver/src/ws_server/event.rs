// hubserver/src/ws_server/event.rs

//! Hub 事件与出站帧的类型定义。
//!
//! 连接 I/O 任务把边界上发生的一切（新连接、已解码的消息、二进制帧、
//! 解码失败、断开）归一成 [`HubEvent`] 发往 Hub 的事件通道；Hub 的回复
//! 则以 [`OutboundFrame`] 的形式经每条连接的出站通道交给写任务。

use uuid::Uuid;
use ws_transport_utils::message::DeviceMessage;

use super::client_session::ClientSession;

/// 经由连接出站通道交给写任务的一帧。
#[derive(Debug)]
pub enum OutboundFrame {
    /// 一条 JSON 文本帧（已序列化）。
    Text(String),
    /// 一条二进制帧（照片字节）。
    Binary(Vec<u8>),
    /// 关闭连接：写任务发送携带关闭码与原因的关闭帧后结束。
    Close {
        /// WebSocket 关闭码（本服务统一使用 1000）。
        code: u16,
        /// 人类可读的关闭原因文本，不参与机器解析。
        reason: String,
    },
}

/// Hub 事件流中的一个事件。
///
/// 三类事件来源：消息到达、连接关闭、注册计时器到期。Hub 在单个任务中
/// 逐个消费这些事件，共享状态的每一次变更都在一个事件的处理内完成。
#[derive(Debug)]
pub enum HubEvent {
    /// 一条新连接完成了 WebSocket 握手。会话内含该连接的出站发送端。
    Connected {
        /// 新建立的会话。
        session: ClientSession,
    },
    /// 连接上到达了一条已在边界处解码的 JSON 消息。
    EnvelopeReceived {
        /// 发送方连接的会话标识。
        client_id: Uuid,
        /// 解码后的消息。
        message: DeviceMessage,
    },
    /// 连接上到达了一条二进制帧。按协议约定，二进制帧始终被视为
    /// 原始照片字节，是否接受由路由层根据发送方角色决定。
    BinaryReceived {
        /// 发送方连接的会话标识。
        client_id: Uuid,
        /// 照片字节。
        data: Vec<u8>,
    },
    /// 连接上到达了一条无法解码的文本帧（非法 JSON、缺失 type 字段等）。
    MalformedReceived {
        /// 发送方连接的会话标识。
        client_id: Uuid,
        /// 解码错误的描述，用于日志。
        error: String,
    },
    /// 某条连接的注册计时器到期。若该连接此刻仍未绑定角色，
    /// Hub 会向其发送错误消息并断开。
    RegistrationTimeout {
        /// 计时器所属连接的会话标识。
        client_id: Uuid,
    },
    /// 连接已关闭（对端主动关闭、网络错误或本端要求关闭后读循环结束）。
    Disconnected {
        /// 关闭连接的会话标识。
        client_id: Uuid,
    },
}
