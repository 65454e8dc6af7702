use log::{error, info, warn, LevelFilter};
use hubserver::ws_server::hub::{Hub, HubConfig};
use hubserver::ws_server::service::WsService;

#[tokio::main]
async fn main() {
    // 初始化日志记录器
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp_millis()
        .init();
    info!("[主程序] 日志系统已成功初始化 (env_logger)，默认级别: Info。");

    // 初始化应用配置（可由 app_settings.json 与 PORT 环境变量覆盖）
    hubserver::config::init_config();
    let app_config = hubserver::config::get_config();
    let ws_config = app_config.websocket.clone();
    info!(
        "[主程序] 应用配置已加载。WebSocket 服务地址: {}:{}，注册时限: {} 秒。",
        ws_config.host, ws_config.port, ws_config.registration_timeout_seconds
    );

    // 创建 Hub（连接注册表、离线队列与状态广播的唯一持有者）及其事件句柄
    let (hub, hub_handle) = Hub::new(HubConfig::from(&ws_config));
    info!("[主程序] 汇聚中心 (Hub) 已创建。");

    // 在后台任务中运行 Hub 事件循环
    tokio::spawn(async move {
        info!("[主程序] 正在启动 Hub 事件循环异步任务...");
        hub.run().await;
        warn!("[主程序] 警告：Hub 事件循环已意外结束。这可能表明存在问题。");
    });
    info!("[主程序] Hub 事件循环已成功派生到后台异步执行。");

    // 为 WebSocket 服务创建 WsService 实例并启动
    let ws_service_instance = WsService::new(ws_config, hub_handle);
    info!("[主程序] 正在启动 WebSocket 服务...");
    if let Err(e) = ws_service_instance.start().await {
        error!("[主程序] 致命错误：启动 WebSocket 服务时发生严重问题: {}", e);
    }
}
