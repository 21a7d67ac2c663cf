use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        donor::{Donor, PushSubscription},
        request::BloodRequest,
    },
};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// 推送给捐献者的消息体，与前端 service worker 消费的形状一致
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub url: String,
    pub request_id: String,
}

/// 推送投递的接缝：生产环境发 HTTP，测试里换成记录桩
#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn deliver(&self, subscription: &PushSubscription, payload: &PushPayload) -> Result<()>;
}

/// 把载荷 POST 到订阅端点的投递实现
///
/// 订阅端点对本服务是不透明的投递地址；载荷加密是推送网关的事情。
pub struct WebPushDelivery {
    client: reqwest::Client,
    ttl: u32,
}

impl WebPushDelivery {
    pub fn new(ttl: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            ttl,
        }
    }
}

#[async_trait]
impl PushDelivery for WebPushDelivery {
    async fn deliver(&self, subscription: &PushSubscription, payload: &PushPayload) -> Result<()> {
        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", self.ttl)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Delivery(format!(
                "push endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationService {
    delivery: Arc<dyn PushDelivery>,
    enabled: bool,
}

impl NotificationService {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            delivery: Arc::new(WebPushDelivery::new(config.push_ttl)),
            enabled: config.push_enabled,
        })
    }

    /// 注入自定义投递实现（测试用）
    pub fn with_delivery(delivery: Arc<dyn PushDelivery>) -> Self {
        Self {
            delivery,
            enabled: true,
        }
    }

    /// 给单个捐献者推送血液请求通知
    /// 没有订阅或未开启通知时静默跳过
    pub async fn notify(&self, donor: &Donor, request: &BloodRequest) -> Result<()> {
        let Some(subscription) = donor.push_subscription.as_ref() else {
            return Ok(());
        };
        if !donor.notifications_enabled {
            return Ok(());
        }

        let payload = PushPayload {
            title: "Blood Donation Request".to_string(),
            body: format!(
                "Urgent need for {} blood at {}.",
                request.blood_group,
                request.hospital_name.as_deref().unwrap_or("a nearby hospital")
            ),
            url: "/".to_string(),
            request_id: request.id.clone(),
        };

        self.delivery.deliver(subscription, &payload).await
    }

    /// 对一次提交的所有匹配捐献者并发投递，等全部尘埃落定后返回尝试数。
    /// 单个投递失败只记日志，不影响其它投递，更不影响请求本身。
    pub async fn notify_all(&self, donors: &[Donor], request: &BloodRequest) -> usize {
        if !self.enabled {
            debug!("Push notifications disabled, skipping dispatch");
            return 0;
        }

        let eligible: Vec<&Donor> = donors
            .iter()
            .filter(|donor| donor.push_subscription.is_some() && donor.notifications_enabled)
            .collect();

        let deliveries = eligible.iter().map(|donor| self.notify(donor, request));
        let results = join_all(deliveries).await;

        for (donor, result) in eligible.iter().zip(results.iter()) {
            if let Err(e) = result {
                warn!(
                    "Push delivery to donor {} failed for request {}: {}",
                    donor.id, request.id, e
                );
            }
        }

        eligible.len()
    }
}
