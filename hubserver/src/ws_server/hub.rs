// hubserver/src/ws_server/hub.rs

//! Hub 事件循环：所有共享状态的唯一持有者。
//!
//! [`Hub`] 独占持有连接注册表、离线队列与状态广播器，在单个 tokio 任务中
//! 逐个消费 [`HubEvent`]。三类事件来源（消息到达、连接关闭、注册计时器
//! 到期）都汇入同一条事件通道，因此对共享状态的每一次变更都在一个事件
//! 的处理内不可抢占地完成；同一角色上的操作天然不会交错。
//!
//! 出站方向全部使用非阻塞的 `try_send`（发后不理）：向某条连接推送失败
//! （通道关闭或打满）被统一视为传输故障，该连接立刻走与断开事件相同的
//! 清理流程。单条连接的故障从不影响其他连接，更不会使 Hub 停摆。

use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use common_models::enums::DeviceRole;
use ws_transport_utils::message::ServerMessage;

use crate::config::WebSocketConfig;

use super::client_session::ClientSession;
use super::connection_registry::ConnectionRegistry;
use super::event::{HubEvent, OutboundFrame};
use super::message_router;
use super::outbound_queue::OutboundQueues;
use super::registration_timer::spawn_registration_timer;
use super::status_broadcaster::{BroadcastOutcome, StatusBroadcaster};

/// Hub 事件通道的容量。连接 I/O 任务在通道打满时会被自然地反压。
const HUB_EVENT_CHANNEL_CAPACITY: usize = 256;

/// 本服务统一使用的 WebSocket 关闭码。
pub(crate) const NORMAL_CLOSE_CODE: u16 = 1000;

/// Hub 行为的配置参数。
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// 连接允许停留在未注册状态的时长。
    pub registration_timeout: Duration,
    /// 照片队列容量上限。
    pub photo_queue_capacity: usize,
    /// 单个指令队列容量上限。
    pub command_queue_capacity: usize,
}

impl From<&WebSocketConfig> for HubConfig {
    fn from(config: &WebSocketConfig) -> Self {
        Self {
            registration_timeout: Duration::from_secs(config.registration_timeout_seconds),
            photo_queue_capacity: config.photo_queue_capacity,
            command_queue_capacity: config.command_queue_capacity,
        }
    }
}

/// Hub 事件通道的发送端句柄，交给监听服务与连接 I/O 任务使用。
#[derive(Debug, Clone)]
pub struct HubHandle {
    event_tx: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    /// 向 Hub 投递一个事件。仅当 Hub 已整体停止时返回错误。
    pub(crate) async fn dispatch(&self, event: HubEvent) -> Result<(), ()> {
        self.event_tx.send(event).await.map_err(|_| ())
    }
}

/// 汇聚中心本体：连接注册表、离线队列与状态广播器的唯一持有者。
#[derive(Debug)]
pub struct Hub {
    pub(crate) config: HubConfig,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) queues: OutboundQueues,
    pub(crate) status: StatusBroadcaster,
    event_tx: mpsc::Sender<HubEvent>,
    event_rx: mpsc::Receiver<HubEvent>,
}

impl Hub {
    /// 创建 Hub 及其事件通道句柄。
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (event_tx, event_rx) = mpsc::channel(HUB_EVENT_CHANNEL_CAPACITY);
        let handle = HubHandle {
            event_tx: event_tx.clone(),
        };
        let hub = Self {
            queues: OutboundQueues::new(config.photo_queue_capacity, config.command_queue_capacity),
            registry: ConnectionRegistry::new(),
            status: StatusBroadcaster::new(),
            config,
            event_tx,
            event_rx,
        };
        info!("[汇聚中心] Hub 已创建，注册时限: {:?}", hub.config.registration_timeout);
        (hub, handle)
    }

    /// 运行事件循环，直到所有事件发送端关闭。
    ///
    /// 设计为通过 `tokio::spawn` 在后台长期运行；正常部署下此方法不会返回。
    pub async fn run(mut self) {
        info!("[汇聚中心] 事件循环已启动。");
        while let Some(event) = self.event_rx.recv().await {
            self.handle_event(event);
        }
        warn!("[汇聚中心] 事件通道已全部关闭，事件循环结束。");
    }

    /// 处理单个事件。事件处理是同步的：处理期间不会挂起，
    /// 因此共享状态的变更相对于其他事件是原子的。
    pub(crate) fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connected { session } => self.on_connected(session),
            HubEvent::EnvelopeReceived { client_id, message } => {
                if let Err(e) = message_router::handle_envelope(self, client_id, message) {
                    error!("[汇聚中心] 连接 {}: 消息处理出错: {}", client_id, e);
                }
            }
            HubEvent::BinaryReceived { client_id, data } => {
                message_router::handle_binary(self, client_id, data);
            }
            HubEvent::MalformedReceived { client_id, error } => {
                message_router::handle_malformed(self, client_id, error);
            }
            HubEvent::RegistrationTimeout { client_id } => self.on_registration_timeout(client_id),
            HubEvent::Disconnected { client_id } => self.on_disconnected(client_id),
        }
    }

    /// 新连接接入：装上注册看门狗并加入注册表。
    fn on_connected(&mut self, mut session: ClientSession) {
        session.registration_timer = Some(spawn_registration_timer(
            self.event_tx.clone(),
            session.client_id,
            self.config.registration_timeout,
        ));
        self.registry.insert(session);
    }

    /// 注册计时器到期：连接若仍未绑定角色则通知并断开。
    ///
    /// 计时器在注册成功与连接清理时都会被取消，但取消与到期之间存在
    /// 竞争窗口；迟到的超时事件在这里被角色检查兜底为无害的空操作。
    fn on_registration_timeout(&mut self, client_id: Uuid) {
        match self.registry.get(client_id) {
            Some(session) if !session.role.is_assigned() => {
                warn!(
                    "[汇聚中心] 连接 {} (addr={}) 未在时限内注册，断开连接。",
                    client_id, session.addr
                );
                self.close_connection(client_id, Some("registration required"), "registration timeout");
            }
            Some(_) => {
                debug!("[汇聚中心] 连接 {} 的迟到超时事件被忽略（已注册）。", client_id);
            }
            None => {
                debug!("[汇聚中心] 连接 {} 的迟到超时事件被忽略（已移除）。", client_id);
            }
        }
    }

    /// 连接关闭：清理会话，摄像头端/执行端下线时重新广播状态。
    fn on_disconnected(&mut self, client_id: Uuid) {
        if let Some(mut session) = self.registry.unregister(client_id) {
            session.cancel_registration_timer();
            match session.role {
                DeviceRole::Camera | DeviceRole::Actuator => {
                    info!(
                        "[汇聚中心] 设备端断开: id={}, 角色={:?}，重新广播连接状态。",
                        client_id, session.role
                    );
                    self.broadcast_status();
                }
                DeviceRole::Controller => {
                    info!("[汇聚中心] 控制端断开: id={}。", client_id);
                }
                DeviceRole::Unassigned => {
                    debug!("[汇聚中心] 未注册连接断开: id={}。", client_id);
                }
            }
        } else {
            debug!(
                "[汇聚中心] 断开事件对应的连接 {} 已不在注册表中（可能已被替换或清理）。",
                client_id
            );
        }
    }

    /// 非阻塞地向指定连接推送一帧。
    ///
    /// 推送失败（通道关闭或打满）时执行与断开相同的清理流程，并把帧
    /// 原样归还给调用方决定是否补入离线队列。目标连接不存在时同样归还。
    pub(crate) fn send_frame(
        &mut self,
        client_id: Uuid,
        frame: OutboundFrame,
    ) -> Result<(), OutboundFrame> {
        let Some(session) = self.registry.get(client_id) else {
            debug!("[汇聚中心] 向不存在的连接 {} 推送被跳过。", client_id);
            return Err(frame);
        };
        match session.try_send_frame(frame) {
            Ok(()) => Ok(()),
            Err(frame) => {
                warn!(
                    "[汇聚中心] 向连接 {} 推送失败（通道关闭或消费过慢），按传输故障清理该连接。",
                    client_id
                );
                self.cleanup_failed_connection(client_id);
                Err(frame)
            }
        }
    }

    /// 向指定连接推送一条服务端消息。返回是否成功交给出站通道。
    pub(crate) fn send_server_message(&mut self, client_id: Uuid, message: &ServerMessage) -> bool {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                error!("[汇聚中心] 服务端消息序列化失败: {}", e);
                return false;
            }
        };
        self.send_frame(client_id, OutboundFrame::Text(text)).is_ok()
    }

    /// 主动关闭一条连接：可选地先发送错误消息，再发送关闭帧，最后清理会话。
    pub(crate) fn close_connection(
        &mut self,
        client_id: Uuid,
        error_message: Option<&str>,
        reason: &str,
    ) {
        if let Some(session) = self.registry.get(client_id) {
            if let Some(message) = error_message {
                if let Ok(text) = ServerMessage::error(message).encode() {
                    let _ = session.try_send_frame(OutboundFrame::Text(text));
                }
            }
            let _ = session.try_send_frame(OutboundFrame::Close {
                code: NORMAL_CLOSE_CODE,
                reason: reason.to_string(),
            });
        }
        if let Some(mut session) = self.registry.unregister(client_id) {
            session.cancel_registration_timer();
            if matches!(session.role, DeviceRole::Camera | DeviceRole::Actuator) {
                self.broadcast_status();
            }
        }
    }

    /// 关闭一条已被新连接替换下线的旧会话。
    ///
    /// 旧会话此刻已不在注册表中；向其发送关闭帧后随会话一起丢弃其
    /// 出站通道，写任务随即结束并关闭底层连接。
    pub(crate) fn close_evicted(&mut self, mut session: ClientSession) {
        info!(
            "[汇聚中心] 关闭被替换下线的连接: id={}, addr={}, 角色={:?}",
            session.client_id, session.addr, session.role
        );
        session.cancel_registration_timer();
        let _ = session.try_send_frame(OutboundFrame::Close {
            code: NORMAL_CLOSE_CODE,
            reason: "replaced".to_string(),
        });
    }

    /// 传输故障清理：与断开事件相同的流程。
    ///
    /// 会话被移除后其出站通道随之关闭，连接的写任务自行结束并关闭底层
    /// 连接；稍后读循环投递的断开事件会命中空注册表，是无害的空操作。
    pub(crate) fn cleanup_failed_connection(&mut self, client_id: Uuid) {
        if let Some(mut session) = self.registry.unregister(client_id) {
            session.cancel_registration_timer();
            if matches!(session.role, DeviceRole::Camera | DeviceRole::Actuator) {
                self.broadcast_status();
            }
        }
    }

    /// 重新计算设备在线状态，并在控制端在线时推送快照。
    /// 推送失败时对控制端连接执行传输故障清理。
    pub(crate) fn broadcast_status(&mut self) {
        self.status.recompute(&self.registry);
        match self.status.broadcast(&self.registry) {
            BroadcastOutcome::Sent | BroadcastOutcome::NoController => {}
            BroadcastOutcome::SendFailed => {
                if let Some(controller_id) =
                    self.registry.lookup(DeviceRole::Controller).map(|s| s.client_id)
                {
                    self.cleanup_failed_connection(controller_id);
                }
            }
        }
    }
}
