//! 通用枚举模块。
//!
//! 本模块定义了在宠物安防汇聚平台多个组件之间共享的通用枚举类型。
//! 这些枚举旨在提供类型安全，并确保对于如设备角色等概念在整个系统中有一致的表示。
//!
//! 所有在此模块中定义的枚举都应派生 `Serialize`, `Deserialize`, `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
//! (如果适合作为 HashMap/HashSet 的键) 以支持数据交换、调试、实例复制、比较和集合操作。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 表示 WebSocket 连接在系统中所扮演的设备角色。
///
/// 这个枚举用于区分三类固定的设备端（手机控制端、摄像头端、执行端），
/// 以便服务器能够根据其角色应用不同的消息路由、排队和状态广播策略。
/// 每个角色在任一时刻最多只允许一条活动连接占用。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    /// 手机控制端。负责下发配置与拍照指令，并接收告警、照片和连接状态快照。
    Controller,
    /// 摄像头端。照片负载与移动告警的唯一来源。
    Camera,
    /// 执行端。根据指令执行物理动作（例如开灯）。
    Actuator,
    /// 连接刚建立、尚未通过注册消息绑定角色时的初始状态。
    /// 注册计时器到期前仍处于该状态的连接会被服务端主动断开。
    Unassigned,
}

impl DeviceRole {
    /// 根据注册消息 `device` 字段的线上取值解析出对应的角色。
    ///
    /// 合法取值为 `"controller"`、`"camera"`、`"actuator"`；
    /// 其余任何字符串（包括空串）都返回 `None`，由调用方按"未知设备"处理。
    pub fn from_device_name(name: &str) -> Option<DeviceRole> {
        match name {
            "controller" => Some(DeviceRole::Controller),
            "camera" => Some(DeviceRole::Camera),
            "actuator" => Some(DeviceRole::Actuator),
            _ => None,
        }
    }

    /// 返回该角色在注册协议中使用的线上名称。
    /// `Unassigned` 不是可注册角色，没有线上名称。
    pub fn device_name(&self) -> Option<&'static str> {
        match self {
            DeviceRole::Controller => Some("controller"),
            DeviceRole::Camera => Some("camera"),
            DeviceRole::Actuator => Some("actuator"),
            DeviceRole::Unassigned => None,
        }
    }

    /// 该连接是否已经绑定到某个具体角色。
    pub fn is_assigned(&self) -> bool {
        !matches!(self, DeviceRole::Unassigned)
    }
}

// 为 DeviceRole 实现 Display trait
impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 使用 Debug 格式化，它已经为我们生成了枚举成员的名称字符串
        // 例如 DeviceRole::Controller 会变成 "Controller"
        write!(f, "{:?}", self)
    }
}
