// hubserver/src/ws_server/connection_registry.rs

//! 连接注册表：设备角色 → 至多一条活动连接的映射。
//!
//! 注册表持有所有活动会话，并为三个可注册角色各维护一个占位。
//! 不变式：任一时刻每个角色至多被一条连接占用；向已被占用的角色
//! 注册新连接会把旧连接从注册表中摘除并交还给调用方，由 Hub 负责
//! 以 "replaced" 为由关闭它，绝不允许旧连接被悄悄覆盖后悬空存活。
//!
//! 所有操作都是同步完成的（中途没有挂起点），注册表只被 Hub 的
//! 事件循环任务访问，因此同一角色上的操作不会交错。

use log::{debug, info, warn};
use std::collections::HashMap;
use uuid::Uuid;

use common_models::enums::DeviceRole;

use super::client_session::ClientSession;

/// 管理所有活动的设备连接会话与角色占位。
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// 所有活动会话，键为会话标识。未注册的连接也在其中。
    sessions: HashMap<Uuid, ClientSession>,
    /// 控制端角色占位。
    controller: Option<Uuid>,
    /// 摄像头端角色占位。
    camera: Option<Uuid>,
    /// 执行端角色占位。
    actuator: Option<Uuid>,
}

impl ConnectionRegistry {
    /// 创建一个新的空注册表。
    pub fn new() -> Self {
        Self::default()
    }

    /// 把一条新接入（尚未注册角色）的会话加入注册表。
    pub fn insert(&mut self, session: ClientSession) {
        info!(
            "[连接注册表] 新连接接入: id={}, addr={}, 初始角色={:?}",
            session.client_id, session.addr, session.role
        );
        self.sessions.insert(session.client_id, session);
        debug!("[连接注册表] 当前活动连接总数: {}", self.sessions.len());
    }

    /// 把已在注册表中的连接绑定到指定角色。
    ///
    /// 若该角色此前已被另一条连接占用，旧连接会被从注册表中摘除并作为
    /// 返回值交还，调用方必须显式关闭它（关闭原因 "replaced"）。
    /// `role` 必须是可注册角色；`client_id` 必须已通过 [`ConnectionRegistry::insert`] 加入。
    pub fn register(&mut self, role: DeviceRole, client_id: Uuid) -> Option<ClientSession> {
        if !role.is_assigned() {
            warn!("[连接注册表] 拒绝把连接 {} 绑定到不可注册角色 {:?}", client_id, role);
            return None;
        }
        if !self.sessions.contains_key(&client_id) {
            warn!("[连接注册表] 尝试注册不存在的连接: id={}", client_id);
            return None;
        }

        // 先摘除旧占位者（如果有且不是自身），再安装新占位
        let evicted = match self.slot(role) {
            Some(old_id) if old_id != client_id => {
                info!(
                    "[连接注册表] 角色 {:?} 已被连接 {} 占用，旧连接将被替换下线",
                    role, old_id
                );
                self.sessions.remove(&old_id)
            }
            _ => None,
        };

        self.set_slot(role, Some(client_id));
        if let Some(session) = self.sessions.get_mut(&client_id) {
            session.role = role;
            info!(
                "[连接注册表] 连接注册成功: id={}, addr={}, 角色={:?}",
                session.client_id, session.addr, role
            );
        }
        evicted
    }

    /// 从注册表中移除一条连接。
    ///
    /// 角色占位仅在仍指向这条连接时才被清空：被替换下线的旧连接
    /// 稍后送达的断开事件不得影响接替它的新连接。
    /// 找到并移除时返回被移除的会话，否则返回 `None`。
    pub fn unregister(&mut self, client_id: Uuid) -> Option<ClientSession> {
        match self.sessions.remove(&client_id) {
            Some(session) => {
                if session.role.is_assigned() && self.slot(session.role) == Some(client_id) {
                    self.set_slot(session.role, None);
                }
                info!(
                    "[连接注册表] 连接移除: id={}, addr={}, 角色={:?}",
                    session.client_id, session.addr, session.role
                );
                debug!("[连接注册表] 移除后当前活动连接总数: {}", self.sessions.len());
                Some(session)
            }
            None => {
                debug!("[连接注册表] 尝试移除不存在的连接: id={} (可能已被替换下线)", client_id);
                None
            }
        }
    }

    /// 查找当前占用指定角色的会话。
    pub fn lookup(&self, role: DeviceRole) -> Option<&ClientSession> {
        self.slot(role).and_then(|id| self.sessions.get(&id))
    }

    /// 根据会话标识获取会话的引用。
    pub fn get(&self, client_id: Uuid) -> Option<&ClientSession> {
        self.sessions.get(&client_id)
    }

    /// 根据会话标识获取会话的可变引用。
    pub fn get_mut(&mut self, client_id: Uuid) -> Option<&mut ClientSession> {
        self.sessions.get_mut(&client_id)
    }

    /// 当前活动连接总数（含未注册连接）。
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// 注册表当前是否为空。
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn slot(&self, role: DeviceRole) -> Option<Uuid> {
        match role {
            DeviceRole::Controller => self.controller,
            DeviceRole::Camera => self.camera,
            DeviceRole::Actuator => self.actuator,
            DeviceRole::Unassigned => None,
        }
    }

    fn set_slot(&mut self, role: DeviceRole, value: Option<Uuid>) {
        match role {
            DeviceRole::Controller => self.controller = value,
            DeviceRole::Camera => self.camera = value,
            DeviceRole::Actuator => self.actuator = value,
            DeviceRole::Unassigned => {}
        }
    }
}
