use chrono::{DateTime, Utc};
use common_models::enums::DeviceRole;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::event::OutboundFrame;

/// 代表一个已连接到服务器的 WebSocket 设备连接的会话状态及相关句柄。
///
/// 每个成功建立的 WebSocket 连接都会在服务端对应一个 `ClientSession` 实例。
/// 此结构体封装了连接的唯一标识、网络信息、设备角色、出站通信信道
/// 以及注册看门狗的计时器句柄。
///
/// 会话在其整个生命周期内由 Hub 的事件循环任务独占持有，
/// 因此 `role` 等可变状态是普通字段，不需要锁保护。
#[derive(Debug)]
pub struct ClientSession {
    /// 由服务端在此会话成功创建时生成的、全局唯一的连接标识符 (UUID 版本 4)。
    pub client_id: Uuid,

    /// 连接当前绑定的设备角色。
    /// 会话创建时为 `DeviceRole::Unassigned`，在注册消息被接受后由 Hub 更新；
    /// 一经绑定便不再改变，直到连接关闭。
    pub role: DeviceRole,

    /// Tokio MPSC 通道的发送端 (`Sender`)。
    /// 此 `sender` 专门用于异步地向这个特定的连接推送 [`OutboundFrame`]。
    /// 连接的写任务会从通道另一端取出帧并实际发送到设备。
    /// 发送使用非阻塞的 `try_send`：通道被打满说明对端消费过慢，
    /// Hub 会把该连接按传输故障处理。
    pub sender: mpsc::Sender<OutboundFrame>,

    /// 连接的源网络地址，包含其 IP 地址和端口号。
    pub addr: SocketAddr,

    /// 此会话在服务端被成功创建的时间戳 (使用协调世界时 UTC)。
    pub connected_at: DateTime<Utc>,

    /// 注册看门狗的计时器任务句柄。
    /// 在连接接入时装上；注册成功或连接清理时通过 [`ClientSession::cancel_registration_timer`]
    /// 恰好取消一次，绝不允许计时器在会话销毁后继续存活。
    pub registration_timer: Option<JoinHandle<()>>,
}

impl ClientSession {
    /// 创建一个新的 `ClientSession` 实例。
    ///
    /// 此构造函数用于在 WebSocket 握手成功后，为新接受的连接初始化一个会话对象。
    /// 它会生成一个唯一的 `client_id`，记录当前的创建时间，并把角色初始化为
    /// `Unassigned`。注册计时器由 Hub 在收到 `Connected` 事件时装上。
    pub fn new(addr: SocketAddr, sender: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            role: DeviceRole::Unassigned,
            sender,
            addr,
            connected_at: Utc::now(),
            registration_timer: None,
        }
    }

    /// 取消注册计时器。
    ///
    /// 通过 `Option::take` 保证计时器恰好被取消一次：注册成功时取消，
    /// 或连接因任何其他原因清理时取消，重复调用是无害的空操作。
    pub fn cancel_registration_timer(&mut self) {
        if let Some(handle) = self.registration_timer.take() {
            handle.abort();
        }
    }

    /// 非阻塞地向该连接的出站通道推送一帧。
    ///
    /// 推送失败时把帧原样归还给调用方：通道已关闭（写任务已结束）或
    /// 通道已打满（对端消费过慢）都视为传输故障，由调用方执行与连接
    /// 断开相同的清理流程。
    pub fn try_send_frame(&self, frame: OutboundFrame) -> Result<(), OutboundFrame> {
        self.sender.try_send(frame).map_err(|e| e.into_inner())
    }
}
