use std::sync::Arc;

use crate::{
    config::Config,
    services::{
        database::Database, donor::DonorService, message::MessageService,
        notification::NotificationService, request::RequestService,
    },
};

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 捐献者目录服务
    pub donor_service: DonorService,

    /// 血液请求生命周期服务
    pub request_service: RequestService,

    /// 推送通知服务
    pub notification_service: NotificationService,

    /// 站内消息服务
    pub message_service: MessageService,
}
