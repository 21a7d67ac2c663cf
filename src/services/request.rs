use crate::{
    error::{AppError, Result},
    models::{
        blood::{canonical_group, compatible_donor_groups},
        request::*,
    },
    services::{Database, DonorService, MessageService, NotificationService},
    utils::validation::{normalize_email, normalize_phone},
};
use chrono::Utc;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

/// 待处理请求唯一性约束的最终后盾：检查和插入在同一个事务里。
/// 服务层的前置检查只是为了给出更友好的错误信息。
const INSERT_REQUEST_SQL: &str = r#"
    BEGIN TRANSACTION;
    LET $dup = (SELECT VALUE id FROM request WHERE $phone != '' AND phone = $phone AND bloodGroup = $group AND status = 'pending');
    IF array::len($dup) > 0 { THROW 'duplicate_pending_request' };
    CREATE type::thing('request', $new_id) CONTENT $data;
    COMMIT TRANSACTION;
"#;

#[derive(Clone)]
pub struct RequestService {
    db: Arc<Database>,
    donor_service: DonorService,
    notification_service: NotificationService,
    message_service: MessageService,
    sender_label: String,
}

impl RequestService {
    pub async fn new(
        db: Arc<Database>,
        donor_service: DonorService,
        notification_service: NotificationService,
        message_service: MessageService,
    ) -> Result<Self> {
        let sender_label = db.config.notification_sender.clone();
        Ok(Self {
            db,
            donor_service,
            notification_service,
            message_service,
            sender_label,
        })
    }

    /// 提交血液请求：去重、生成管理码、落库、匹配捐献者并推送通知
    pub async fn submit(&self, payload: SubmitRequestPayload) -> Result<SubmitOutcome> {
        payload.validate().map_err(AppError::ValidatorError)?;

        let email = payload
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty());
        let phone = payload
            .phone
            .as_deref()
            .map(normalize_phone)
            .filter(|p| !p.is_empty());
        let blood_group = canonical_group(&payload.blood_group);
        let requested_at = payload.requested_at.unwrap_or_else(Utc::now);

        debug!(
            "Submitting blood request for group {} (phone: {:?})",
            blood_group, phone
        );

        // 前置检查：同一电话 + 血型已有待处理请求时直接拒绝
        if let Some(phone) = phone.as_deref() {
            if self.pending_exists(phone, &blood_group).await? {
                return Err(AppError::duplicate(
                    "A pending request for this phone number and blood group already exists",
                ));
            }
        }

        let id = Uuid::new_v4().simple().to_string();
        let manage_code = generate_manage_code();

        let mut data = serde_json::Map::new();
        data.insert("requesterName".into(), json!(payload.requester_name.trim()));
        data.insert("bloodGroup".into(), json!(blood_group));
        data.insert("urgency".into(), serde_json::to_value(payload.urgency)?);
        data.insert("requestedAt".into(), json!(requested_at));
        data.insert("status".into(), json!("pending"));
        data.insert("manageCode".into(), json!(manage_code));
        if let Some(email) = &email {
            data.insert("email".into(), json!(email));
        }
        if let Some(phone) = &phone {
            data.insert("phone".into(), json!(phone));
        }
        if let Some(hospital) = payload.hospital_name.as_deref().filter(|h| !h.trim().is_empty()) {
            data.insert("hospitalName".into(), json!(hospital.trim()));
        }
        if let Some(location) = payload
            .hospital_location
            .as_deref()
            .filter(|l| !l.trim().is_empty())
        {
            data.insert("hospitalLocation".into(), json!(location.trim()));
        }
        if let Some(notes) = payload.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            data.insert("notes".into(), json!(notes.trim()));
        }

        let mut response = self
            .db
            .query_with_params(
                INSERT_REQUEST_SQL,
                json!({
                    "phone": phone.as_deref().unwrap_or(""),
                    "group": blood_group,
                    "new_id": id,
                    "data": data,
                }),
            )
            .await?;

        ensure_inserted(&mut response)?;

        let request = self.get(&id).await?;

        // 匹配兼容血型的捐献者并并发推送；投递失败不影响本次提交
        let groups = compatible_donor_groups(&request.blood_group);
        let donors = self
            .donor_service
            .find_by_compatible_groups(&groups, true, true)
            .await?;
        let notified_donors = self.notification_service.notify_all(&donors, &request).await;

        info!(
            "Blood request {} created, {} donor(s) notified",
            request.id, notified_donors
        );

        Ok(SubmitOutcome {
            request,
            notified_donors,
        })
    }

    pub async fn get(&self, id: &str) -> Result<BloodRequest> {
        self.db
            .get_by_id("request", id)
            .await?
            .ok_or_else(|| AppError::not_found("Blood request"))
    }

    /// 把请求标记为已接受：管理码或邮箱+电话二选一。
    /// 状态转换是一条带条件的 UPDATE，对单条记录原子执行。
    pub async fn resolve(&self, id: &str, payload: ResolveRequestPayload) -> Result<BloodRequest> {
        let existing = self.get(id).await?;
        let was_pending = existing.status == RequestStatus::Pending;

        let code = payload.manage_code.as_deref().unwrap_or("").trim().to_string();
        let email = payload
            .email
            .as_deref()
            .map(normalize_email)
            .unwrap_or_default();
        let phone = payload
            .phone
            .as_deref()
            .map(normalize_phone)
            .unwrap_or_default();

        // donorDetails 只在本次提供时覆盖，避免重放把快照抹掉
        let set_clause = if payload.donor_details.is_some() {
            "SET status = 'accepted', resolvedAt = $now, donorDetails = $donor_details"
        } else {
            "SET status = 'accepted', resolvedAt = $now"
        };
        let sql = format!(
            r#"
                UPDATE type::thing('request', $id) {}
                WHERE ($code != '' AND manageCode = $code)
                OR ($email != '' AND $phone != '' AND email = $email AND phone = $phone)
                RETURN AFTER
            "#,
            set_clause
        );

        let pure_id = existing.id.strip_prefix("request:").unwrap_or(&existing.id);
        let mut response = self
            .db
            .query_with_params(
                &sql,
                json!({
                    "id": pure_id,
                    "code": code,
                    "email": email,
                    "phone": phone,
                    "now": Utc::now(),
                    "donor_details": payload.donor_details,
                }),
            )
            .await?;

        let updated: Vec<serde_json::Value> = response.take(0)?;
        if updated.is_empty() {
            return Err(AppError::forbidden(
                "Management code or contact details do not match this request",
            ));
        }

        let request = self.get(pure_id).await?;

        // 首次接受时给请求方写一条 donor-found 站内消息
        if was_pending {
            if let Some(receiver) = request.email.as_deref() {
                let content = format!(
                    "A donor has been found for your {} request at {}.",
                    request.blood_group,
                    request.hospital_name.as_deref().unwrap_or("the hospital")
                );
                self.message_service
                    .create(&self.sender_label, receiver, &content)
                    .await?;
            }
        }

        info!("Blood request {} resolved", request.id);
        Ok(request)
    }

    /// 请求方找回管理码：邮箱和电话都要与存储记录精确匹配
    pub async fn reveal_code(&self, id: &str, payload: RevealCodePayload) -> Result<String> {
        payload.validate().map_err(AppError::ValidatorError)?;

        let request = self.get(id).await?;
        let email = normalize_email(&payload.email);
        let phone = normalize_phone(&payload.phone);

        let email_matches =
            !email.is_empty() && request.email.as_deref() == Some(email.as_str());
        let phone_matches =
            !phone.is_empty() && request.phone.as_deref() == Some(phone.as_str());

        if email_matches && phone_matches {
            Ok(request.manage_code)
        } else {
            Err(AppError::forbidden(
                "Contact details do not match this request",
            ))
        }
    }

    pub async fn list(&self, filter_pending: bool) -> Result<Vec<BloodRequest>> {
        let sql = if filter_pending {
            "SELECT *, type::string(id) AS id FROM request WHERE status = 'pending' ORDER BY requestedAt DESC"
        } else {
            "SELECT *, type::string(id) AS id FROM request ORDER BY requestedAt DESC"
        };

        let mut response = self.db.query(sql).await?;
        let requests: Vec<BloodRequest> = response.take(0)?;
        Ok(requests)
    }

    pub async fn count_open(&self) -> Result<usize> {
        self.db.count("request", Some("status = 'pending'")).await
    }

    async fn pending_exists(&self, phone: &str, blood_group: &str) -> Result<bool> {
        let mut response = self
            .db
            .query_with_params(
                r#"
                    SELECT VALUE type::string(id) FROM request
                    WHERE phone = $phone AND bloodGroup = $group AND status = 'pending'
                "#,
                json!({ "phone": phone, "group": blood_group }),
            )
            .await?;

        let ids: Vec<String> = response.take(0)?;
        Ok(!ids.is_empty())
    }
}

/// 生成 6 位十进制管理码（100000-999999）
/// 每个请求独立抽取；核销还要求身份匹配，码撞车是可容忍的
fn generate_manage_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// 检查插入事务的结果：backstop 抛出的重复标记映射为 409
fn ensure_inserted(response: &mut surrealdb::Response) -> Result<()> {
    let errors = Database::statement_errors(response);
    if errors
        .iter()
        .any(|e| e.to_string().contains("duplicate_pending_request"))
    {
        return Err(AppError::duplicate(
            "A pending request for this phone number and blood group already exists",
        ));
    }
    if let Some(error) = errors.into_iter().next() {
        return Err(AppError::Database(error));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn manage_code_is_six_decimal_digits() {
        for _ in 0..1000 {
            let code = generate_manage_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    /// 两次直接跑插入事务，模拟抢在服务层前置检查之后落库的并发提交
    #[tokio::test]
    async fn insert_backstop_rejects_duplicate_pending() {
        let db = Database::new(&Config::default()).await.unwrap();
        db.define_schema().await.unwrap();

        let data = json!({
            "requesterName": "Meera",
            "phone": "777",
            "bloodGroup": "O-",
            "status": "pending",
            "manageCode": "123456",
            "requestedAt": Utc::now(),
        });

        let mut response = db
            .query_with_params(
                INSERT_REQUEST_SQL,
                json!({"phone": "777", "group": "O-", "new_id": "first", "data": data.clone()}),
            )
            .await
            .unwrap();
        ensure_inserted(&mut response).expect("first insert should commit");

        let mut response = db
            .query_with_params(
                INSERT_REQUEST_SQL,
                json!({"phone": "777", "group": "O-", "new_id": "second", "data": data}),
            )
            .await
            .unwrap();
        let err = ensure_inserted(&mut response).unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)), "got {:?}", err);
    }
}
