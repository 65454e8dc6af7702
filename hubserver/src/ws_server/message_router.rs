// hubserver/src/ws_server/message_router.rs

//! 负责处理从设备连接接收到的消息，并根据 (消息类型, 发送方角色) 进行分发处理。
//!
//! 连接的状态机只有一次迁移：`Unassigned → 已注册(角色)`，由注册消息触发，
//! 连接关闭即终态。注册之前，除注册消息外的任何消息（含二进制帧）都只会
//! 得到错误回复；注册之后按下列分发表路由：
//!
//! | 消息类型 | 合法发送方 | 动作 |
//! |---|---|---|
//! | `ping` | 任意已注册角色 | 回复 `pong` |
//! | `alert` | 摄像头端/执行端 | 原样转发控制端（离线则丢弃），并隐式向执行端下发开灯指令 |
//! | `network_config`/`security_config` | 控制端 | 分别转发摄像头端与执行端（离线则入队），回执 success:true |
//! | `capture_request` | 控制端 | 转发摄像头端（离线则入队并回执 success:false） |
//! | `command_response` | 摄像头端/执行端 | 原样转发控制端（从不排队） |
//! | 二进制帧 | 摄像头端 | 按照片处理，并隐式向执行端下发开灯指令 |
//! | `image_data` | 摄像头端 | Base64 解码后按与二进制帧完全相同的照片流程处理 |
//! | 其他 | 任意 | 回复错误，连接保持打开 |
//!
//! 协议层错误（未知类型、错误角色、畸形 JSON）一律只回复错误消息、
//! 不断开连接；仅注册失败（未知设备名、注册超时）是连接的终态错误。

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use log::{debug, info, warn};
use serde_json::Value;
use uuid::Uuid;

use common_models::enums::DeviceRole;
use common_models::ws_payloads::{CommandResponsePayload, PongPayload, RegisteredPayload, TurnOnLightPayload};
use ws_transport_utils::message::{DeviceMessage, ServerMessage};

use super::event::OutboundFrame;
use super::hub::Hub;

/// 处理一条已在边界处解码的入站消息。
///
/// 发送方连接必须仍在注册表中；消息按上方分发表路由。
/// 即使向某个对端的推送失败，此函数也会返回 `Ok(())`：
/// 传输故障由 Hub 的发送助手就地转化为对应连接的清理，
/// 不应导致整个事件循环终止。
pub(crate) fn handle_envelope(
    hub: &mut Hub,
    client_id: Uuid,
    message: DeviceMessage,
) -> Result<(), anyhow::Error> {
    let Some(role) = hub.registry.get(client_id).map(|s| s.role) else {
        debug!("[消息路由] 连接 {} 已不在注册表中，消息被忽略。", client_id);
        return Ok(());
    };

    debug!(
        "[消息路由] 连接 {} (角色 {:?}): 收到消息，类型: '{}'",
        client_id,
        role,
        message.message_type()
    );

    match message {
        DeviceMessage::Register(payload) => {
            if role.is_assigned() {
                // 已注册连接的再次注册不在分发表中，按未知指令处理
                warn!(
                    "[消息路由] 已注册连接 {} (角色 {:?}) 重复发送注册消息。",
                    client_id, role
                );
                hub.send_server_message(client_id, &ServerMessage::error("unknown command"));
            } else {
                match DeviceRole::from_device_name(&payload.device) {
                    Some(new_role) => register_connection(hub, client_id, new_role),
                    None => {
                        // 未知设备名是注册失败：错误回复后关闭连接
                        warn!(
                            "[消息路由] 连接 {} 以未知设备名 '{}' 注册，断开连接。",
                            client_id, payload.device
                        );
                        hub.close_connection(client_id, Some("unknown device"), "invalid device");
                    }
                }
            }
        }
        // 连接上第一条被接受的消息必须是注册；其余消息在注册前一律拒绝
        _ if !role.is_assigned() => {
            debug!("[消息路由] 未注册连接 {} 发送了非注册消息，已拒绝。", client_id);
            hub.send_server_message(client_id, &ServerMessage::error("registration required"));
        }
        DeviceMessage::Ping(_) => {
            hub.send_server_message(client_id, &ServerMessage::Pong(PongPayload {}));
        }
        DeviceMessage::Alert(envelope) => {
            if matches!(role, DeviceRole::Camera | DeviceRole::Actuator) {
                info!("[消息路由] 设备端 {:?} 上报告警，转发控制端并下发开灯指令。", role);
                forward_to_controller(hub, envelope);
                send_turn_on_light(hub);
            } else {
                hub.send_server_message(client_id, &ServerMessage::error("unknown command"));
            }
        }
        DeviceMessage::NetworkConfig(envelope) => {
            handle_config_fanout(hub, client_id, role, envelope, "network config forwarded");
        }
        DeviceMessage::SecurityConfig(envelope) => {
            handle_config_fanout(hub, client_id, role, envelope, "security config forwarded");
        }
        DeviceMessage::CaptureRequest(envelope) => {
            if role == DeviceRole::Controller {
                handle_capture_request(hub, client_id, envelope);
            } else {
                hub.send_server_message(client_id, &ServerMessage::error("unknown command"));
            }
        }
        DeviceMessage::CommandResponse(envelope) => {
            if matches!(role, DeviceRole::Camera | DeviceRole::Actuator) {
                // 瞬态回执：控制端离线时直接丢弃，从不排队
                forward_to_controller(hub, envelope);
            } else {
                hub.send_server_message(client_id, &ServerMessage::error("unknown command"));
            }
        }
        DeviceMessage::ImageData(payload) => {
            if role == DeviceRole::Camera {
                handle_image_data(hub, client_id, payload);
            } else {
                hub.send_server_message(client_id, &ServerMessage::error("unknown command"));
            }
        }
        DeviceMessage::Unknown { message_type } => {
            warn!(
                "[消息路由] 连接 {} (角色 {:?}) 发送了未知消息类型: '{}'",
                client_id, role, message_type
            );
            hub.send_server_message(client_id, &ServerMessage::error("unknown command"));
        }
    }

    Ok(())
}

/// 处理一条二进制帧。
///
/// 协议约定二进制帧始终是原始照片字节：来自摄像头端时走照片流程并
/// 隐式下发开灯指令；来自其他角色时回复错误，连接保持打开。
pub(crate) fn handle_binary(hub: &mut Hub, client_id: Uuid, data: Vec<u8>) {
    let Some(role) = hub.registry.get(client_id).map(|s| s.role) else {
        debug!("[消息路由] 连接 {} 已不在注册表中，二进制帧被忽略。", client_id);
        return;
    };

    match role {
        DeviceRole::Camera => {
            info!("[消息路由] 收到摄像头端照片 ({} 字节)。", data.len());
            handle_photo(hub, data);
            send_turn_on_light(hub);
        }
        DeviceRole::Unassigned => {
            debug!("[消息路由] 未注册连接 {} 发送了二进制帧，已拒绝。", client_id);
            hub.send_server_message(client_id, &ServerMessage::error("registration required"));
        }
        _ => {
            warn!("[消息路由] 非摄像头端 (角色 {:?}) 发送了二进制帧，已拒绝。", role);
            hub.send_server_message(client_id, &ServerMessage::error("only camera may send binary"));
        }
    }
}

/// 处理一条无法解码的文本帧：回复通用错误，连接保持打开。
pub(crate) fn handle_malformed(hub: &mut Hub, client_id: Uuid, error: String) {
    warn!("[消息路由] 连接 {} 的文本帧解码失败: {}", client_id, error);
    hub.send_server_message(client_id, &ServerMessage::error("invalid message format"));
}

/// 执行注册迁移：取消计时器、安装角色占位（替换旧占位者）、回复确认、
/// 排空该角色的离线队列、广播状态快照。
fn register_connection(hub: &mut Hub, client_id: Uuid, new_role: DeviceRole) {
    // 1. 恰好一次地取消注册看门狗
    match hub.registry.get_mut(client_id) {
        Some(session) => session.cancel_registration_timer(),
        None => {
            warn!("[消息路由] 注册迁移时连接 {} 已不在注册表中。", client_id);
            return;
        }
    }

    // 2. 安装角色占位；同角色的旧连接被替换下线
    if let Some(evicted) = hub.registry.register(new_role, client_id) {
        hub.close_evicted(evicted);
    }

    // 3. 注册确认
    hub.send_server_message(
        client_id,
        &ServerMessage::Registered(RegisteredPayload {
            message: "OK".to_string(),
        }),
    );

    // 4. 排空该角色的离线队列（严格 FIFO）
    match new_role {
        DeviceRole::Controller => drain_photos(hub, client_id),
        DeviceRole::Camera | DeviceRole::Actuator => drain_commands(hub, new_role, client_id),
        DeviceRole::Unassigned => {}
    }

    // 5. 每次注册成功后都重新广播连接状态
    hub.broadcast_status();
}

/// 把照片队列按原始顺序排空到刚注册的控制端。
/// 中途推送失败时把失败的那张放回队头并停止，剩余照片等待下次注册。
fn drain_photos(hub: &mut Hub, controller_id: Uuid) {
    let mut drained = 0usize;
    while let Some(photo) = hub.queues.pop_photo() {
        match hub.send_frame(controller_id, OutboundFrame::Binary(photo)) {
            Ok(()) => drained += 1,
            Err(OutboundFrame::Binary(photo)) => {
                hub.queues.requeue_photo_front(photo);
                warn!("[消息路由] 照片排空中途推送失败，剩余照片留在队列中。");
                break;
            }
            Err(_) => break,
        }
    }
    if drained > 0 {
        info!("[消息路由] 已向控制端补发 {} 张离线期间的照片。", drained);
    }
}

/// 把指定设备端的指令队列按原始顺序排空到刚注册的连接。
fn drain_commands(hub: &mut Hub, role: DeviceRole, device_id: Uuid) {
    let mut drained = 0usize;
    while let Some(envelope) = hub.queues.pop_command(role) {
        match hub.send_frame(device_id, OutboundFrame::Text(envelope)) {
            Ok(()) => drained += 1,
            Err(OutboundFrame::Text(envelope)) => {
                hub.queues.requeue_command_front(role, envelope);
                warn!("[消息路由] 指令排空中途推送失败，剩余指令留在队列中。");
                break;
            }
            Err(_) => break,
        }
    }
    if drained > 0 {
        info!("[消息路由] 已向 {:?} 补发 {} 条离线期间的指令。", role, drained);
    }
}

/// 照片流程：控制端在线则原样转发一帧二进制，否则入照片队列。
/// 转发因传输故障失败时照片同样入队（控制端此刻已被清理，视为离线）。
fn handle_photo(hub: &mut Hub, photo: Vec<u8>) {
    match hub.registry.lookup(DeviceRole::Controller).map(|s| s.client_id) {
        Some(controller_id) => match hub.send_frame(controller_id, OutboundFrame::Binary(photo)) {
            Ok(()) => debug!("[消息路由] 照片已转发控制端。"),
            Err(OutboundFrame::Binary(photo)) => {
                info!("[消息路由] 控制端推送失败，照片转入离线队列。");
                hub.queues.enqueue_photo(photo);
            }
            Err(_) => {}
        },
        None => {
            info!("[消息路由] 控制端离线，照片转入离线队列 (队列长度: {})。", hub.queues.photo_len() + 1);
            hub.queues.enqueue_photo(photo);
        }
    }
}

/// 把一条设备端信封原样转发给控制端。控制端离线或推送失败时直接丢弃（从不排队）。
fn forward_to_controller(hub: &mut Hub, envelope: Value) {
    match hub.registry.lookup(DeviceRole::Controller).map(|s| s.client_id) {
        Some(controller_id) => {
            let _ = hub.send_frame(controller_id, OutboundFrame::Text(envelope.to_string()));
        }
        None => {
            debug!("[消息路由] 控制端离线，瞬态消息被丢弃。");
        }
    }
}

/// 把一条指令信封投递给指定设备端：在线则直接推送，离线（或推送失败）则入其指令队列。
fn deliver_or_queue(hub: &mut Hub, role: DeviceRole, envelope: String) {
    match hub.registry.lookup(role).map(|s| s.client_id) {
        Some(device_id) => match hub.send_frame(device_id, OutboundFrame::Text(envelope)) {
            Ok(()) => debug!("[消息路由] 指令已直接推送给 {:?}。", role),
            Err(OutboundFrame::Text(envelope)) => {
                info!("[消息路由] {:?} 推送失败，指令转入离线队列。", role);
                hub.queues.enqueue_command(role, envelope);
            }
            Err(_) => {}
        },
        None => {
            info!("[消息路由] {:?} 离线，指令转入离线队列。", role);
            hub.queues.enqueue_command(role, envelope);
        }
    }
}

/// 配置类消息的扇出：独立投递摄像头端与执行端，再向控制端回执受理成功。
fn handle_config_fanout(
    hub: &mut Hub,
    client_id: Uuid,
    role: DeviceRole,
    envelope: Value,
    response_message: &str,
) {
    if role != DeviceRole::Controller {
        hub.send_server_message(client_id, &ServerMessage::error("unknown command"));
        return;
    }

    let text = envelope.to_string();
    deliver_or_queue(hub, DeviceRole::Camera, text.clone());
    deliver_or_queue(hub, DeviceRole::Actuator, text);

    hub.send_server_message(
        client_id,
        &ServerMessage::CommandResponse(CommandResponsePayload {
            success: true,
            message: response_message.to_string(),
        }),
    );
}

/// 拍照指令：摄像头端在线则直接转发并回执成功；离线则入队并回执 success:false，
/// 告知控制端指令已被缓存。
fn handle_capture_request(hub: &mut Hub, controller_id: Uuid, envelope: Value) {
    let text = envelope.to_string();
    let delivered = match hub.registry.lookup(DeviceRole::Camera).map(|s| s.client_id) {
        Some(camera_id) => match hub.send_frame(camera_id, OutboundFrame::Text(text)) {
            Ok(()) => true,
            Err(OutboundFrame::Text(text)) => {
                hub.queues.enqueue_command(DeviceRole::Camera, text);
                false
            }
            Err(_) => false,
        },
        None => {
            hub.queues.enqueue_command(DeviceRole::Camera, text);
            false
        }
    };

    let response = if delivered {
        CommandResponsePayload {
            success: true,
            message: "capture request forwarded".to_string(),
        }
    } else {
        CommandResponsePayload {
            success: false,
            message: "camera offline, capture request queued".to_string(),
        }
    };
    hub.send_server_message(controller_id, &ServerMessage::CommandResponse(response));
}

/// Base64 图像数据：解码成功后按与二进制帧完全相同的照片流程处理。
/// `success` 为 false、`data` 为空或无法解码时视为无效图像数据。
fn handle_image_data(
    hub: &mut Hub,
    client_id: Uuid,
    payload: common_models::ws_payloads::ImageDataPayload,
) {
    if !payload.success {
        warn!("[消息路由] 摄像头端上报了 success=false 的图像数据。");
        hub.send_server_message(client_id, &ServerMessage::error("invalid image data"));
        return;
    }
    match BASE64_STANDARD.decode(payload.data.as_bytes()) {
        Ok(photo) if !photo.is_empty() => {
            info!(
                "[消息路由] Base64 图像数据解码成功 ({} 字节)，按照片流程处理。",
                photo.len()
            );
            handle_photo(hub, photo);
            send_turn_on_light(hub);
        }
        Ok(_) => {
            warn!("[消息路由] 图像数据解码结果为空。");
            hub.send_server_message(client_id, &ServerMessage::error("invalid image data"));
        }
        Err(e) => {
            warn!("[消息路由] 图像数据 Base64 解码失败: {}", e);
            hub.send_server_message(client_id, &ServerMessage::error("invalid image data"));
        }
    }
}

/// 向执行端下发一条隐式开灯指令（在线直推，离线入队）。
fn send_turn_on_light(hub: &mut Hub) {
    match ServerMessage::TurnOnLight(TurnOnLightPayload {}).encode() {
        Ok(text) => deliver_or_queue(hub, DeviceRole::Actuator, text),
        Err(e) => warn!("[消息路由] 开灯指令序列化失败: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use crate::ws_server::client_session::ClientSession;
    use crate::ws_server::event::HubEvent;
    use crate::ws_server::hub::{Hub, HubConfig, HubHandle};
    use common_models::ws_payloads::{AlertPayload, ImageDataPayload, RegisterPayload};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn test_hub() -> (Hub, HubHandle) {
        Hub::new(HubConfig {
            registration_timeout: Duration::from_secs(45),
            photo_queue_capacity: 8,
            command_queue_capacity: 8,
        })
    }

    fn connect(hub: &mut Hub) -> (uuid::Uuid, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(16);
        let addr = "127.0.0.1:45678".parse().expect("测试地址解析失败");
        let session = ClientSession::new(addr, tx);
        let client_id = session.client_id;
        hub.handle_event(HubEvent::Connected { session });
        (client_id, rx)
    }

    fn register(hub: &mut Hub, client_id: uuid::Uuid, device: &str) {
        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id,
            message: DeviceMessage::Register(RegisterPayload {
                device: device.to_string(),
            }),
        });
    }

    fn next_json(rx: &mut mpsc::Receiver<OutboundFrame>) -> serde_json::Value {
        match rx.try_recv().expect("预期存在一帧出站消息") {
            OutboundFrame::Text(text) => serde_json::from_str(&text).expect("出站文本帧不是合法 JSON"),
            other => panic!("预期文本帧，实际收到: {:?}", other),
        }
    }

    #[tokio::test]
    /// 告警被原样转发给控制端（包括服务端不认识的字段），并向离线的执行端排队开灯指令。
    async fn test_alert_forwarded_verbatim_and_light_queued() {
        let (mut hub, _handle) = test_hub();
        let (controller_id, mut controller_rx) = connect(&mut hub);
        register(&mut hub, controller_id, "controller");
        let _ = next_json(&mut controller_rx); // registered
        let _ = next_json(&mut controller_rx); // esp_status

        let (camera_id, mut camera_rx) = connect(&mut hub);
        register(&mut hub, camera_id, "camera");
        let _ = next_json(&mut camera_rx); // registered
        let _ = next_json(&mut controller_rx); // esp_status（摄像头端注册）

        // 用共享负载结构构造一条告警，并附带一个服务端不认识的字段
        let alert = AlertPayload {
            message: "motion detected".to_string(),
        };
        let mut envelope = serde_json::to_value(&alert).expect("告警负载序列化失败");
        envelope["type"] = json!("alert");
        envelope["zone"] = json!("barn-door");

        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id: camera_id,
            message: DeviceMessage::Alert(envelope),
        });

        let forwarded = next_json(&mut controller_rx);
        assert_eq!(forwarded["type"], json!("alert"));
        assert_eq!(forwarded["message"], json!("motion detected"));
        assert_eq!(forwarded["zone"], json!("barn-door"), "转发应保留未识别的字段");

        // 执行端离线：开灯指令入其指令队列
        assert_eq!(hub.queues.command_len(DeviceRole::Actuator), 1, "开灯指令应进入执行端队列");
        assert_eq!(hub.queues.command_len(DeviceRole::Camera), 0, "摄像头端队列不应受影响");
    }

    #[tokio::test]
    /// 来自控制端的告警不在分发表中，得到未知指令错误。
    async fn test_alert_from_controller_is_rejected() {
        let (mut hub, _handle) = test_hub();
        let (controller_id, mut controller_rx) = connect(&mut hub);
        register(&mut hub, controller_id, "controller");
        let _ = next_json(&mut controller_rx);
        let _ = next_json(&mut controller_rx);

        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id: controller_id,
            message: DeviceMessage::Alert(json!({"type":"alert","message":"spoof"})),
        });

        let reply = next_json(&mut controller_rx);
        assert_eq!(reply["type"], json!("error"));
        assert_eq!(reply["message"], json!("unknown command"));
    }

    #[tokio::test]
    /// 摄像头端在线时拍照指令直接转发并回执成功；离线时入队并回执 success:false。
    async fn test_capture_request_forwarded_or_queued() {
        let (mut hub, _handle) = test_hub();
        let (controller_id, mut controller_rx) = connect(&mut hub);
        register(&mut hub, controller_id, "controller");
        let _ = next_json(&mut controller_rx);
        let _ = next_json(&mut controller_rx);

        // 摄像头端离线：入队 + success:false
        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id: controller_id,
            message: DeviceMessage::CaptureRequest(json!({"type":"capture_request","quality":"high"})),
        });
        let reply = next_json(&mut controller_rx);
        assert_eq!(reply["type"], json!("command_response"));
        assert_eq!(reply["success"], json!(false), "摄像头端离线时应回执 success:false");
        assert_eq!(hub.queues.command_len(DeviceRole::Camera), 1);

        // 摄像头端上线：排空队列中的拍照指令
        let (camera_id, mut camera_rx) = connect(&mut hub);
        register(&mut hub, camera_id, "camera");
        let registered = next_json(&mut camera_rx);
        assert_eq!(registered["type"], json!("registered"));
        let drained = next_json(&mut camera_rx);
        assert_eq!(drained["type"], json!("capture_request"), "排队的拍照指令应在注册后补发");
        assert_eq!(drained["quality"], json!("high"));
        assert_eq!(hub.queues.command_len(DeviceRole::Camera), 0);
        let _ = next_json(&mut controller_rx); // esp_status（摄像头端注册）

        // 摄像头端在线：直接转发 + success:true
        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id: controller_id,
            message: DeviceMessage::CaptureRequest(json!({"type":"capture_request"})),
        });
        let reply = next_json(&mut controller_rx);
        assert_eq!(reply["success"], json!(true), "摄像头端在线时应回执 success:true");
        let forwarded = next_json(&mut camera_rx);
        assert_eq!(forwarded["type"], json!("capture_request"));
    }

    #[tokio::test]
    /// 设备端的指令执行结果原样转发控制端；控制端离线时直接丢弃，从不排队。
    async fn test_command_response_forwarded_never_queued() {
        let (mut hub, _handle) = test_hub();
        let (actuator_id, mut actuator_rx) = connect(&mut hub);
        register(&mut hub, actuator_id, "actuator");
        let _ = next_json(&mut actuator_rx);

        // 控制端离线：回执被丢弃，不进入任何队列
        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id: actuator_id,
            message: DeviceMessage::CommandResponse(json!({"type":"command_response","success":true,"message":"light on"})),
        });
        assert_eq!(hub.queues.command_len(DeviceRole::Camera), 0);
        assert_eq!(hub.queues.command_len(DeviceRole::Actuator), 0);

        // 控制端上线后，新的回执被转发
        let (controller_id, mut controller_rx) = connect(&mut hub);
        register(&mut hub, controller_id, "controller");
        let _ = next_json(&mut controller_rx); // registered
        let _ = next_json(&mut controller_rx); // esp_status

        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id: actuator_id,
            message: DeviceMessage::CommandResponse(json!({"type":"command_response","success":true,"message":"light on"})),
        });
        let forwarded = next_json(&mut controller_rx);
        assert_eq!(forwarded["type"], json!("command_response"));
        assert_eq!(forwarded["message"], json!("light on"));
    }

    #[tokio::test]
    /// Base64 图像数据解码后与二进制帧走完全相同的照片流程。
    async fn test_image_data_decoded_as_photo() {
        let (mut hub, _handle) = test_hub();
        let (camera_id, mut camera_rx) = connect(&mut hub);
        register(&mut hub, camera_id, "camera");
        let _ = next_json(&mut camera_rx);

        let photo_bytes = vec![0xFFu8, 0xD8, 0xFF, 0xE0];
        let encoded = BASE64_STANDARD.encode(&photo_bytes);
        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id: camera_id,
            message: DeviceMessage::ImageData(ImageDataPayload {
                data: encoded,
                trigger: Some("motion".to_string()),
                success: true,
            }),
        });

        // 控制端离线：解码出的照片应与二进制帧一样进入照片队列
        assert_eq!(hub.queues.photo_len(), 1, "解码后的照片应进入照片队列");
        assert_eq!(hub.queues.pop_photo(), Some(photo_bytes), "入队的应是解码后的原始字节");
        // 并且同样触发了对执行端的开灯指令
        assert_eq!(hub.queues.command_len(DeviceRole::Actuator), 1);
    }

    #[tokio::test]
    /// 无效的图像数据（success=false 或非法 Base64）只得到错误回复，连接保持打开。
    async fn test_invalid_image_data_rejected() {
        let (mut hub, _handle) = test_hub();
        let (camera_id, mut camera_rx) = connect(&mut hub);
        register(&mut hub, camera_id, "camera");
        let _ = next_json(&mut camera_rx);

        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id: camera_id,
            message: DeviceMessage::ImageData(ImageDataPayload {
                data: "definitely not base64 !!!".to_string(),
                trigger: None,
                success: true,
            }),
        });
        let reply = next_json(&mut camera_rx);
        assert_eq!(reply["type"], json!("error"));
        assert_eq!(reply["message"], json!("invalid image data"));
        assert_eq!(hub.queues.photo_len(), 0, "无效图像数据不应产生照片");
        assert!(hub.registry.get(camera_id).is_some(), "协议层错误不应断开连接");
    }

    #[tokio::test]
    /// 非摄像头端的二进制帧被拒绝，但连接保持打开、后续消息仍被处理。
    async fn test_binary_from_actuator_rejected_connection_stays_open() {
        let (mut hub, _handle) = test_hub();
        let (actuator_id, mut actuator_rx) = connect(&mut hub);
        register(&mut hub, actuator_id, "actuator");
        let _ = next_json(&mut actuator_rx);

        hub.handle_event(HubEvent::BinaryReceived {
            client_id: actuator_id,
            data: vec![1, 2, 3],
        });
        let reply = next_json(&mut actuator_rx);
        assert_eq!(reply["type"], json!("error"));
        assert_eq!(reply["message"], json!("only camera may send binary"));
        assert_eq!(hub.queues.photo_len(), 0, "被拒绝的二进制帧不应进入照片队列");

        // 连接仍然可用：心跳得到 pong
        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id: actuator_id,
            message: DeviceMessage::Ping(common_models::ws_payloads::PingPayload {}),
        });
        let pong = next_json(&mut actuator_rx);
        assert_eq!(pong["type"], json!("pong"), "协议层错误后连接应保持可用");
    }

    #[tokio::test]
    /// 畸形文本帧只得到通用错误回复，连接保持打开。
    async fn test_malformed_frame_keeps_connection_open() {
        let (mut hub, _handle) = test_hub();
        let (camera_id, mut camera_rx) = connect(&mut hub);
        register(&mut hub, camera_id, "camera");
        let _ = next_json(&mut camera_rx);

        hub.handle_event(HubEvent::MalformedReceived {
            client_id: camera_id,
            error: "文本帧不是合法 JSON".to_string(),
        });
        let reply = next_json(&mut camera_rx);
        assert_eq!(reply["type"], json!("error"));
        assert_eq!(reply["message"], json!("invalid message format"));
        assert!(hub.registry.get(camera_id).is_some(), "畸形帧不应导致断开");
    }

    #[tokio::test]
    /// 配置扇出在摄像头端在线、执行端离线时：一边直推、一边入队。
    async fn test_config_fanout_mixed_presence() {
        let (mut hub, _handle) = test_hub();
        let (controller_id, mut controller_rx) = connect(&mut hub);
        register(&mut hub, controller_id, "controller");
        let _ = next_json(&mut controller_rx);
        let _ = next_json(&mut controller_rx);

        let (camera_id, mut camera_rx) = connect(&mut hub);
        register(&mut hub, camera_id, "camera");
        let _ = next_json(&mut camera_rx);
        let _ = next_json(&mut controller_rx); // esp_status

        hub.handle_event(HubEvent::EnvelopeReceived {
            client_id: controller_id,
            message: DeviceMessage::SecurityConfig(json!({"type":"security_config","armed":true})),
        });

        // 摄像头端在线：直接收到配置
        let forwarded = next_json(&mut camera_rx);
        assert_eq!(forwarded["type"], json!("security_config"));
        assert_eq!(forwarded["armed"], json!(true));
        // 执行端离线：配置入其队列
        assert_eq!(hub.queues.command_len(DeviceRole::Actuator), 1);
        // 控制端收到受理回执
        let reply = next_json(&mut controller_rx);
        assert_eq!(reply["type"], json!("command_response"));
        assert_eq!(reply["success"], json!(true));
    }
}
