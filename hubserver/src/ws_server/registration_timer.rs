// hubserver/src/ws_server/registration_timer.rs

//! 注册看门狗计时器。
//!
//! 每条连接在接入时装上一个计时器：到期时向 Hub 的事件通道投递一个
//! [`HubEvent::RegistrationTimeout`] 事件。若该连接此刻仍未绑定角色，
//! Hub 会向其发送错误消息并以 "registration timeout" 为由关闭连接，
//! 及时回收从不注册的连接占用的资源。
//!
//! 计时器是本服务中唯一的定时机制。它在注册成功或连接清理时被恰好
//! 取消一次（见 `ClientSession::cancel_registration_timer`）；取消与
//! 到期之间的竞争由 Hub 侧的"角色仍为 Unassigned"检查兜底，
//! 迟到的到期事件对已注册或已移除的连接是无害的空操作。

use log::debug;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use super::event::HubEvent;

/// 为一条新接入的连接派生注册看门狗任务。
///
/// 任务睡满 `timeout` 后把超时事件投递回 Hub 的事件通道。投递失败
/// 只可能发生在 Hub 已整体停止时，记录日志后静默结束即可。
///
/// # 参数
/// * `event_tx` - Hub 事件通道的发送端。
/// * `client_id` - 计时器所属连接的会话标识。
/// * `timeout` - 允许连接停留在未注册状态的时长。
///
/// # 返回
/// 返回计时器任务的 `JoinHandle`，由会话持有并负责取消。
pub fn spawn_registration_timer(
    event_tx: mpsc::Sender<HubEvent>,
    client_id: Uuid,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(timeout).await;
        debug!("[注册计时器] 连接 {} 的注册时限已到，投递超时事件。", client_id);
        if event_tx
            .send(HubEvent::RegistrationTimeout { client_id })
            .await
            .is_err()
        {
            debug!("[注册计时器] Hub 事件通道已关闭，超时事件未投递 (连接 {})。", client_id);
        }
    })
}
