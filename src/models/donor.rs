use crate::utils::serde_helpers::thing_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_true() -> bool {
    true
}

/// 浏览器推送订阅句柄，对核心逻辑来说是不透明的投递地址
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<PushSubscriptionKeys>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushSubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donor {
    #[serde(with = "thing_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub blood_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_subscription: Option<PushSubscription>,
    pub registered_at: DateTime<Utc>,
}

/// 捐献者注册/更新载荷
/// 兼容旧表单的字段名（donorName 等）
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDonorPayload {
    #[validate(length(min = 1, max = 120))]
    #[serde(alias = "donorName")]
    pub name: String,
    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "donorPhone")]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 8))]
    #[serde(alias = "group")]
    pub blood_group: String,
    #[serde(default, alias = "donorLocation")]
    pub location: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub push_subscription: Option<PushSubscription>,
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
}
