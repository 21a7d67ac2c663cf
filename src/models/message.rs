use crate::utils::serde_helpers::thing_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 站内消息：仅在请求被接受时生成（donor-found 通知），之后只读
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(with = "thing_id")]
    pub id: String,
    pub sender: String,
    pub receiver_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}
