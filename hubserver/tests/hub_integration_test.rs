// hubserver/tests/hub_integration_test.rs

//! 汇聚服务器端到端集成测试：通过真实的 WebSocket 连接驱动完整的
//! 监听、注册、路由、排队与广播流程。

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use log::{info, LevelFilter};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep, timeout};

use common_models::ws_payloads::{AlertPayload, ImageDataPayload, RegisterPayload};
use hubserver::config::WebSocketConfig;
use hubserver::ws_server::hub::{Hub, HubConfig};
use hubserver::ws_server::service::WsService;
use ws_transport_utils::client::transport::{connect_client, receive_event, ClientConnection, ClientEvent};
use ws_transport_utils::message::DeviceMessage;

// 辅助函数：初始化日志，仅用于测试，避免多次初始化
fn init_test_logger() {
    let _ = env_logger::builder().filter_level(LevelFilter::Info).is_test(true).try_init();
}

// 辅助函数：测试用的默认配置（随机端口由监听器绑定时决定）
fn test_config() -> WebSocketConfig {
    WebSocketConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        registration_timeout_seconds: 45,
        photo_queue_capacity: 32,
        command_queue_capacity: 64,
        outbound_channel_capacity: 64,
    }
}

// 辅助函数：在随机端口上启动一套完整的 Hub + 监听服务，返回监听地址。
async fn start_test_hub(ws_config: WebSocketConfig) -> SocketAddr {
    let (hub, hub_handle) = Hub::new(HubConfig::from(&ws_config));
    tokio::spawn(hub.run());

    let listener = tokio::net::TcpListener::bind((ws_config.host.as_str(), ws_config.port))
        .await
        .expect("无法绑定到随机端口");
    let addr = listener.local_addr().expect("无法获取本地监听地址");

    let service = WsService::new(ws_config, hub_handle);
    tokio::spawn(async move {
        if let Err(e) = service.serve(listener).await {
            panic!("[测试] WebSocket 服务意外退出: {}", e);
        }
    });

    // 稍微等待，确保服务有足够时间开始接受连接
    sleep(Duration::from_millis(100)).await;
    info!("[测试] 汇聚服务器已在 {} 启动", addr);
    addr
}

// 辅助函数：连接到测试服务器
async fn connect(addr: SocketAddr) -> ClientConnection {
    connect_client(format!("ws://{}", addr)).await.expect("客户端连接汇聚服务器失败")
}

// 辅助函数：带 5 秒超时地接收下一条事件
async fn recv_event(client: &mut ClientConnection) -> ClientEvent {
    timeout(Duration::from_secs(5), receive_event(&mut client.ws_receiver))
        .await
        .expect("等待服务端消息超时")
        .expect("连接意外结束")
        .expect("接收服务端消息失败")
}

// 辅助函数：断言下一条事件是 JSON 消息并返回其值
async fn recv_json(client: &mut ClientConnection) -> Value {
    match recv_event(client).await {
        ClientEvent::Json(value) => value,
        other => panic!("预期 JSON 消息，实际收到: {:?}", other),
    }
}

// 辅助函数：以指定设备名注册并消费 registered 确认
async fn register(client: &mut ClientConnection, device: &str) {
    client
        .send_device_message(&DeviceMessage::Register(RegisterPayload {
            device: device.to_string(),
        }))
        .await
        .expect("发送注册消息失败");
    let reply = recv_json(client).await;
    assert_eq!(reply["type"], json!("registered"), "注册确认的消息类型不正确");
    assert_eq!(reply["message"], json!("OK"));
}

// 辅助函数：注册控制端并消费注册后立刻推送的状态快照，返回快照内容
async fn register_controller(client: &mut ClientConnection) -> Value {
    register(client, "controller").await;
    let status = recv_json(client).await;
    assert_eq!(status["type"], json!("esp_status"), "控制端注册后应立刻收到状态快照");
    status
}

#[tokio::test]
/// 注册与心跳的基本往返：控制端注册成功后心跳得到 pong。
async fn test_register_and_ping_round_trip() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;
    let mut controller = connect(addr).await;

    let status = register_controller(&mut controller).await;
    assert_eq!(status["camera"], json!(false), "尚无摄像头端时快照应为离线");
    assert_eq!(status["actuator"], json!(false));

    controller
        .send_device_message(&DeviceMessage::Ping(common_models::ws_payloads::PingPayload {}))
        .await
        .expect("发送心跳失败");
    let pong = recv_json(&mut controller).await;
    assert_eq!(pong["type"], json!("pong"), "已注册连接的心跳应得到 pong");
}

#[tokio::test]
/// 未注册连接的心跳得到错误回复（registration required），而不是 pong。
async fn test_unregistered_ping_gets_error() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;
    let mut client = connect(addr).await;

    client
        .send_device_message(&DeviceMessage::Ping(common_models::ws_payloads::PingPayload {}))
        .await
        .expect("发送心跳失败");
    let reply = recv_json(&mut client).await;
    assert_eq!(reply["type"], json!("error"), "未注册连接的心跳应得到错误回复");
    assert_eq!(reply["message"], json!("registration required"));
}

#[tokio::test]
/// 未知设备名注册：错误回复后连接被关闭（关闭原因 invalid device）。
async fn test_unknown_device_registration_closes_connection() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;
    let mut client = connect(addr).await;

    client
        .send_device_message(&DeviceMessage::Register(RegisterPayload {
            device: "esp32-toaster".to_string(),
        }))
        .await
        .expect("发送注册消息失败");

    let reply = recv_json(&mut client).await;
    assert_eq!(reply["type"], json!("error"));
    assert_eq!(reply["message"], json!("unknown device"));

    match recv_event(&mut client).await {
        ClientEvent::Closed { code, reason } => {
            assert_eq!(code, Some(1000), "关闭码应为 1000");
            assert_eq!(reason.as_deref(), Some("invalid device"), "关闭原因不正确");
        }
        other => panic!("预期连接被关闭，实际收到: {:?}", other),
    }
}

#[tokio::test]
/// 注册超时：时限内未注册的连接先收到错误消息，随后被关闭（关闭原因 registration timeout）。
async fn test_registration_timeout_closes_connection() {
    init_test_logger();
    let mut config = test_config();
    config.registration_timeout_seconds = 1;
    let addr = start_test_hub(config).await;
    let mut client = connect(addr).await;

    // 什么都不发送，等待看门狗出手
    let reply = recv_json(&mut client).await;
    assert_eq!(reply["type"], json!("error"));
    assert_eq!(reply["message"], json!("registration required"));

    match recv_event(&mut client).await {
        ClientEvent::Closed { code, reason } => {
            assert_eq!(code, Some(1000));
            assert_eq!(reason.as_deref(), Some("registration timeout"), "关闭原因不正确");
        }
        other => panic!("预期连接被关闭，实际收到: {:?}", other),
    }
}

#[tokio::test]
/// 控制端离线时的三张照片在其注册后按原始顺序一次性补发。
async fn test_photos_queued_and_drained_in_order() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;

    let mut camera = connect(addr).await;
    register(&mut camera, "camera").await;

    // 控制端离线期间发送三张内容可区分的照片
    let photos: Vec<Vec<u8>> = (1..=3u8).map(|n| vec![n; 16]).collect();
    for photo in &photos {
        camera.send_binary(photo.clone()).await.expect("发送照片失败");
    }
    // 给服务端留出处理入队的时间，确保照片先于控制端注册到达
    sleep(Duration::from_millis(200)).await;

    // 控制端上线：registered → 三张照片按原序 → 状态快照
    let mut controller = connect(addr).await;
    register(&mut controller, "controller").await;
    for expected in &photos {
        match recv_event(&mut controller).await {
            ClientEvent::Binary(data) => assert_eq!(&data, expected, "照片应按原始发送顺序送达"),
            other => panic!("预期照片帧，实际收到: {:?}", other),
        }
    }
    let status = recv_json(&mut controller).await;
    assert_eq!(status["type"], json!("esp_status"));
    assert_eq!(status["camera"], json!(true), "快照应反映摄像头端在线");
}

#[tokio::test]
/// 摄像头端与执行端都离线时，network_config 立刻得到 success:true 回执，
/// 且两台设备注册后各自收到被缓存的配置。
async fn test_network_config_fanout_and_drain() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;

    let mut controller = connect(addr).await;
    let _ = register_controller(&mut controller).await;

    controller
        .send_device_message(&DeviceMessage::NetworkConfig(json!({
            "type": "network_config",
            "ssid": "barn",
            "password": "secret"
        })))
        .await
        .expect("发送网络配置失败");

    let reply = recv_json(&mut controller).await;
    assert_eq!(reply["type"], json!("command_response"));
    assert_eq!(reply["success"], json!(true), "设备离线时配置入队，控制端仍应收到受理回执");

    // 摄像头端注册后应收到被缓存的配置
    let mut camera = connect(addr).await;
    register(&mut camera, "camera").await;
    let drained = recv_json(&mut camera).await;
    assert_eq!(drained["type"], json!("network_config"), "注册后应补发缓存的配置");
    assert_eq!(drained["ssid"], json!("barn"), "配置内容应原样送达");
    let _ = recv_json(&mut controller).await; // esp_status（摄像头端注册）

    // 执行端注册后同样收到被缓存的配置
    let mut actuator = connect(addr).await;
    register(&mut actuator, "actuator").await;
    let drained = recv_json(&mut actuator).await;
    assert_eq!(drained["type"], json!("network_config"));
}

#[tokio::test]
/// 同角色的第二条连接把第一条替换下线（关闭原因 replaced），新连接照常工作。
async fn test_second_camera_replaces_first() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;

    let mut first_camera = connect(addr).await;
    register(&mut first_camera, "camera").await;

    let mut second_camera = connect(addr).await;
    register(&mut second_camera, "camera").await;

    // 旧摄像头端收到关闭帧
    match recv_event(&mut first_camera).await {
        ClientEvent::Closed { code, reason } => {
            assert_eq!(code, Some(1000));
            assert_eq!(reason.as_deref(), Some("replaced"), "被替换下线的关闭原因不正确");
        }
        other => panic!("预期旧连接被关闭，实际收到: {:?}", other),
    }

    // 新摄像头端照常工作
    second_camera
        .send_device_message(&DeviceMessage::Ping(common_models::ws_payloads::PingPayload {}))
        .await
        .expect("发送心跳失败");
    let pong = recv_json(&mut second_camera).await;
    assert_eq!(pong["type"], json!("pong"), "替换后的新连接应照常工作");
}

#[tokio::test]
/// 非摄像头端的二进制帧被拒绝但不断开；告警被转发控制端并向执行端下发开灯指令。
async fn test_binary_rejection_and_alert_forwarding() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;

    let mut controller = connect(addr).await;
    let _ = register_controller(&mut controller).await;

    let mut actuator = connect(addr).await;
    register(&mut actuator, "actuator").await;
    let _ = recv_json(&mut controller).await; // esp_status（执行端注册）

    // 执行端发送二进制帧：被拒绝，但连接保持打开
    actuator.send_binary(vec![1, 2, 3]).await.expect("发送二进制帧失败");
    let reply = recv_json(&mut actuator).await;
    assert_eq!(reply["type"], json!("error"));
    assert_eq!(reply["message"], json!("only camera may send binary"));

    // 执行端上报告警：控制端原样收到，执行端自身收到隐式开灯指令
    let alert = AlertPayload {
        message: "loud noise".to_string(),
    };
    let mut envelope = serde_json::to_value(&alert).expect("告警负载序列化失败");
    envelope["type"] = json!("alert");
    actuator
        .send_device_message(&DeviceMessage::Alert(envelope))
        .await
        .expect("发送告警失败");

    let forwarded = recv_json(&mut controller).await;
    assert_eq!(forwarded["type"], json!("alert"));
    assert_eq!(forwarded["message"], json!("loud noise"), "告警应原样转发控制端");

    let light = recv_json(&mut actuator).await;
    assert_eq!(light["type"], json!("turn_on_light"), "告警应触发对执行端的开灯指令");
}

#[tokio::test]
/// Base64 图像数据在服务端解码后，以二进制帧的形式送达控制端。
async fn test_image_data_delivered_as_binary_photo() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;

    let mut controller = connect(addr).await;
    let _ = register_controller(&mut controller).await;

    let mut camera = connect(addr).await;
    register(&mut camera, "camera").await;
    let _ = recv_json(&mut controller).await; // esp_status（摄像头端注册）

    let photo_bytes = vec![0xFFu8, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    camera
        .send_device_message(&DeviceMessage::ImageData(ImageDataPayload {
            data: BASE64_STANDARD.encode(&photo_bytes),
            trigger: Some("manual".to_string()),
            success: true,
        }))
        .await
        .expect("发送图像数据失败");

    match recv_event(&mut controller).await {
        ClientEvent::Binary(data) => {
            assert_eq!(data, photo_bytes, "控制端收到的应是解码后的原始照片字节");
        }
        other => panic!("预期照片帧，实际收到: {:?}", other),
    }
}

#[tokio::test]
/// 摄像头端断开后，控制端恰好收到一次 camera=false 的状态快照。
async fn test_camera_disconnect_broadcasts_status() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;

    let mut controller = connect(addr).await;
    let _ = register_controller(&mut controller).await;

    let mut camera = connect(addr).await;
    register(&mut camera, "camera").await;
    let status = recv_json(&mut controller).await;
    assert_eq!(status["camera"], json!(true), "摄像头端注册后快照应为在线");

    // 摄像头端主动断开
    camera.close().await.expect("摄像头端关闭连接失败");

    let status = recv_json(&mut controller).await;
    assert_eq!(status["type"], json!("esp_status"));
    assert_eq!(status["camera"], json!(false), "摄像头端断开后快照应为离线");
    assert_eq!(status["connected"], json!(false), "兼容字段应与 camera 一致");
}

#[tokio::test]
/// 畸形 JSON 文本帧只得到通用错误回复，连接保持可用。
async fn test_malformed_json_keeps_connection_usable() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;

    let mut camera = connect(addr).await;
    register(&mut camera, "camera").await;

    camera
        .send_text("this is {not valid json".to_string())
        .await
        .expect("发送畸形文本帧失败");
    let reply = recv_json(&mut camera).await;
    assert_eq!(reply["type"], json!("error"));
    assert_eq!(reply["message"], json!("invalid message format"));

    // 连接仍然可用
    camera
        .send_device_message(&DeviceMessage::Ping(common_models::ws_payloads::PingPayload {}))
        .await
        .expect("发送心跳失败");
    let pong = recv_json(&mut camera).await;
    assert_eq!(pong["type"], json!("pong"), "畸形帧之后连接应保持可用");
}

#[tokio::test]
/// 普通 HTTP 请求得到 200 在线说明；/health 为显式探活端点。
async fn test_http_liveness_probe() {
    init_test_logger();
    let addr = start_test_hub(test_config()).await;

    for path in ["/", "/health", "/anything-else"] {
        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("TCP 连接失败");
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            path, addr
        );
        stream.write_all(request.as_bytes()).await.expect("写入 HTTP 请求失败");

        let mut response = String::new();
        stream.read_to_string(&mut response).await.expect("读取 HTTP 响应失败");
        assert!(
            response.starts_with("HTTP/1.1 200"),
            "路径 {} 应返回 200，实际响应: {}",
            path,
            response.lines().next().unwrap_or("<空>")
        );
    }
}
