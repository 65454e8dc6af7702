// hubserver/src/ws_server/status_broadcaster.rs

//! 设备连接状态快照的计算与推送。
//!
//! 每当注册表发生变化（任一角色注册成功、摄像头端或执行端断开），
//! 状态广播器都会依据注册表的当前内容重新计算摄像头端与执行端的
//! 在线布尔值，并在控制端当前在线时向其推送一条 `esp_status` 快照。
//! 快照是瞬态信息：控制端离线时不排队补发，重新上线的控制端会在
//! 自身注册成功的那一刻收到一份新鲜的快照。

use log::{debug, error, info};

use common_models::enums::DeviceRole;
use common_models::ws_payloads::EspStatusPayload;
use ws_transport_utils::message::ServerMessage;

use super::connection_registry::ConnectionRegistry;
use super::event::OutboundFrame;

/// 一次状态推送的结果，由 Hub 决定是否需要后续清理。
#[derive(Debug, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// 快照已交给控制端连接的出站通道。
    Sent,
    /// 控制端当前不在线，快照被丢弃（从不排队）。
    NoController,
    /// 控制端连接的出站通道推送失败，该连接应按传输故障清理。
    SendFailed,
}

/// 维护派生的设备在线状态并负责向控制端推送快照。
#[derive(Debug, Default)]
pub struct StatusBroadcaster {
    /// 摄像头端当前是否在线。
    camera_connected: bool,
    /// 执行端当前是否在线。
    actuator_connected: bool,
}

impl StatusBroadcaster {
    /// 创建一个初始全离线的状态广播器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 依据注册表的当前内容重新计算在线布尔值。
    pub fn recompute(&mut self, registry: &ConnectionRegistry) {
        self.camera_connected = registry.lookup(DeviceRole::Camera).is_some();
        self.actuator_connected = registry.lookup(DeviceRole::Actuator).is_some();
        debug!(
            "[状态广播] 在线状态重新计算: 摄像头端={}, 执行端={}",
            self.camera_connected, self.actuator_connected
        );
    }

    /// 当前的状态快照负载。`connected` 为兼容旧版控制端的字段，取值等于摄像头端在线状态。
    pub fn snapshot(&self) -> EspStatusPayload {
        EspStatusPayload {
            camera: self.camera_connected,
            actuator: self.actuator_connected,
            connected: self.camera_connected,
        }
    }

    /// 摄像头端当前是否在线。
    pub fn camera_connected(&self) -> bool {
        self.camera_connected
    }

    /// 执行端当前是否在线。
    pub fn actuator_connected(&self) -> bool {
        self.actuator_connected
    }

    /// 把当前快照推送给控制端（若在线）。
    ///
    /// 快照从不排队：控制端离线时直接返回 [`BroadcastOutcome::NoController`]。
    /// 推送失败返回 [`BroadcastOutcome::SendFailed`]，由 Hub 对控制端连接
    /// 执行与断开相同的清理。
    pub fn broadcast(&self, registry: &ConnectionRegistry) -> BroadcastOutcome {
        let Some(controller) = registry.lookup(DeviceRole::Controller) else {
            debug!("[状态广播] 控制端不在线，状态快照不推送、不排队。");
            return BroadcastOutcome::NoController;
        };

        let message = ServerMessage::EspStatus(self.snapshot());
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                // 快照只含布尔值，序列化失败不应发生；记录后按未推送处理
                error!("[状态广播] 状态快照序列化失败: {}", e);
                return BroadcastOutcome::NoController;
            }
        };

        match controller.try_send_frame(OutboundFrame::Text(text)) {
            Ok(()) => {
                info!(
                    "[状态广播] 状态快照已推送给控制端: 摄像头端={}, 执行端={}",
                    self.camera_connected, self.actuator_connected
                );
                BroadcastOutcome::Sent
            }
            Err(_) => {
                error!(
                    "[状态广播] 向控制端 {} 推送状态快照失败，连接将按传输故障处理",
                    controller.client_id
                );
                BroadcastOutcome::SendFailed
            }
        }
    }
}
