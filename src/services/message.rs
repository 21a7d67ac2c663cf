use crate::{
    error::{AppError, Result},
    models::message::Message,
    services::Database,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct MessageService {
    db: Arc<Database>,
}

impl MessageService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    /// 写入一条站内消息（请求被接受时的 donor-found 通知）
    pub async fn create(&self, sender: &str, receiver_id: &str, content: &str) -> Result<Message> {
        debug!("Creating message for receiver {}", receiver_id);

        let id = Uuid::new_v4().simple().to_string();
        let mut response = self
            .db
            .query_with_params(
                r#"
                    CREATE type::thing('message', $id) CONTENT $data RETURN NONE;
                    SELECT *, type::string(id) AS id FROM type::thing('message', $id);
                "#,
                json!({
                    "id": id,
                    "data": {
                        "sender": sender,
                        "receiverId": receiver_id,
                        "content": content,
                        "sentAt": Utc::now(),
                    },
                }),
            )
            .await?;

        let messages: Vec<Message> = response.take(1)?;
        messages
            .into_iter()
            .next()
            .ok_or_else(|| AppError::internal("Failed to create message"))
    }

    /// 某个接收者的消息流，按发送时间排序
    pub async fn list_for_receiver(&self, receiver_id: &str) -> Result<Vec<Message>> {
        let mut response = self
            .db
            .query_with_params(
                r#"
                    SELECT *, type::string(id) AS id FROM message
                    WHERE receiverId = $receiver_id
                    ORDER BY sentAt ASC
                "#,
                json!({ "receiver_id": receiver_id }),
            )
            .await?;

        let messages: Vec<Message> = response.take(0)?;
        Ok(messages)
    }
}
