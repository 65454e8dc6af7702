// hubserver/src/ws_server/outbound_queue.rs

//! 目标角色离线时的出站缓存队列。
//!
//! 两类队列：照片队列（摄像头端 → 控制端方向，二进制负载）与
//! 每个设备端各自独立的指令队列（控制端 → 摄像头端/执行端方向，
//! 已序列化的 JSON 信封）。插入顺序被严格保留，目标角色注册成功时
//! 按 FIFO 一次性排空。
//!
//! 队列有容量上限：打满后继续入队会丢弃最旧的一项并记录日志，
//! 绝不允许无界增长。排空过程中发送失败的那一项会通过
//! `requeue_*_front` 放回队头，剩余项原地保留等待角色下次注册。

use log::{debug, warn};
use std::collections::VecDeque;

use common_models::enums::DeviceRole;

/// 按角色组织的出站缓存队列集合。
#[derive(Debug)]
pub struct OutboundQueues {
    /// 控制端离线时缓存的照片，先进先出。
    photos: VecDeque<Vec<u8>>,
    /// 摄像头端离线时缓存的指令信封，先进先出。
    camera_commands: VecDeque<String>,
    /// 执行端离线时缓存的指令信封，先进先出。与摄像头端的队列彼此独立。
    actuator_commands: VecDeque<String>,
    /// 照片队列容量上限。
    photo_capacity: usize,
    /// 单个指令队列容量上限。
    command_capacity: usize,
}

impl OutboundQueues {
    /// 创建一组空队列。
    pub fn new(photo_capacity: usize, command_capacity: usize) -> Self {
        Self {
            photos: VecDeque::new(),
            camera_commands: VecDeque::new(),
            actuator_commands: VecDeque::new(),
            photo_capacity,
            command_capacity,
        }
    }

    /// 把一张照片追加到照片队列尾部。队列已满时丢弃最旧的一张。
    pub fn enqueue_photo(&mut self, photo: Vec<u8>) {
        if self.photos.len() >= self.photo_capacity {
            if let Some(dropped) = self.photos.pop_front() {
                warn!(
                    "[出站队列] 照片队列已满 (容量 {})，丢弃最旧的一张照片 ({} 字节)",
                    self.photo_capacity,
                    dropped.len()
                );
            }
        }
        self.photos.push_back(photo);
        debug!("[出站队列] 照片入队，当前照片队列长度: {}", self.photos.len());
    }

    /// 从照片队列头部取出一张照片。
    pub fn pop_photo(&mut self) -> Option<Vec<u8>> {
        self.photos.pop_front()
    }

    /// 把发送失败的照片放回队头，保持原有顺序等待下次排空。
    pub fn requeue_photo_front(&mut self, photo: Vec<u8>) {
        self.photos.push_front(photo);
    }

    /// 当前照片队列长度。
    pub fn photo_len(&self) -> usize {
        self.photos.len()
    }

    /// 把一条指令信封追加到指定设备端的指令队列尾部。队列已满时丢弃最旧的一条。
    /// 只有摄像头端与执行端拥有指令队列；其他角色的入队请求会被忽略并记录日志。
    pub fn enqueue_command(&mut self, role: DeviceRole, envelope: String) {
        let capacity = self.command_capacity;
        let Some(queue) = self.command_queue_mut(role) else {
            warn!("[出站队列] 角色 {:?} 没有指令队列，指令被丢弃", role);
            return;
        };
        if queue.len() >= capacity {
            if let Some(dropped) = queue.pop_front() {
                warn!(
                    "[出站队列] 角色 {:?} 的指令队列已满 (容量 {})，丢弃最旧的一条指令: {}",
                    role, capacity, dropped
                );
            }
        }
        queue.push_back(envelope);
        debug!(
            "[出站队列] 指令入队，角色 {:?} 的指令队列长度: {}",
            role,
            self.command_len(role)
        );
    }

    /// 从指定设备端的指令队列头部取出一条指令信封。
    pub fn pop_command(&mut self, role: DeviceRole) -> Option<String> {
        self.command_queue_mut(role).and_then(|queue| queue.pop_front())
    }

    /// 把发送失败的指令放回对应队列的队头。
    pub fn requeue_command_front(&mut self, role: DeviceRole, envelope: String) {
        if let Some(queue) = self.command_queue_mut(role) {
            queue.push_front(envelope);
        }
    }

    /// 指定设备端的指令队列当前长度。没有指令队列的角色恒为 0。
    pub fn command_len(&self, role: DeviceRole) -> usize {
        match role {
            DeviceRole::Camera => self.camera_commands.len(),
            DeviceRole::Actuator => self.actuator_commands.len(),
            _ => 0,
        }
    }

    fn command_queue_mut(&mut self, role: DeviceRole) -> Option<&mut VecDeque<String>> {
        match role {
            DeviceRole::Camera => Some(&mut self.camera_commands),
            DeviceRole::Actuator => Some(&mut self.actuator_commands),
            _ => None,
        }
    }
}
