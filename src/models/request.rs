use crate::utils::serde_helpers::thing_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
    Critical,
}

/// 接受请求时记录的捐献者快照，轮询端用它展示联系方式
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DonorDetails {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequest {
    #[serde(with = "thing_id")]
    pub id: String,
    pub requester_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub blood_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_location: Option<String>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donor_details: Option<DonorDetails>,
    pub manage_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// 提交血液请求的载荷
///
/// 这是外部载荷形状与规范内部记录之间的适配层：
/// 历史客户端用过 requiredBloodGroup / receiverName / hospital 等字段名
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequestPayload {
    #[validate(length(min = 1, max = 120))]
    #[serde(alias = "receiverName", alias = "name")]
    pub requester_name: String,
    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "receiverPhone")]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 8))]
    #[serde(alias = "requiredBloodGroup")]
    pub blood_group: String,
    #[serde(default, alias = "hospital")]
    pub hospital_name: Option<String>,
    #[serde(default)]
    pub hospital_location: Option<String>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
}

/// PATCH /api/requests/:id/resolve 的载荷：管理码或邮箱+电话二选一
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequestPayload {
    #[serde(default)]
    pub manage_code: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub donor_details: Option<DonorDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RevealCodePayload {
    #[validate(email)]
    pub email: String,
    pub phone: String,
}

/// submit 的返回值：存储的请求加上通知到的捐献者数量
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    #[serde(flatten)]
    pub request: BloodRequest,
    pub notified_donors: usize,
}
