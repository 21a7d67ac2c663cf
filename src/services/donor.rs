use crate::{
    error::{AppError, Result},
    models::{blood::canonical_group, donor::*},
    services::Database,
    utils::validation::{normalize_email, normalize_phone, validate_phone_format},
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

/// 按联系方式（电话或邮箱）二步查找再写入的 upsert SQL。
/// 查找和写入在同一个事务里：电话和邮箱命中两个不同捐献者时抛出冲突。
const UPSERT_DONOR_SQL: &str = r#"
    BEGIN TRANSACTION;
    LET $matches = array::distinct((SELECT VALUE id FROM donor WHERE ($phone != '' AND phone = $phone) OR ($email != '' AND email = $email)));
    IF array::len($matches) > 1 { THROW 'donor_contact_conflict' };
    IF array::len($matches) = 1 { (UPDATE $matches[0] CONTENT $data) } ELSE { (CREATE type::thing('donor', $new_id) CONTENT $data) };
    COMMIT TRANSACTION;
"#;

#[derive(Clone)]
pub struct DonorService {
    db: Arc<Database>,
}

impl DonorService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    /// 注册或更新捐献者：按电话查找，其次按邮箱，命中则整体覆盖，否则新建
    pub async fn register_or_update(&self, payload: RegisterDonorPayload) -> Result<Donor> {
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

        if email.is_none() && phone.is_none() {
            return Err(AppError::validation(
                "Either a phone number or an email address is required",
            ));
        }

        if let Some(phone) = phone.as_deref() {
            validate_phone_format(phone)?;
        }

        debug!(
            "Registering donor {:?} (phone: {:?}, email: {:?})",
            payload.name, phone, email
        );

        let blood_group = canonical_group(&payload.blood_group);
        let registered_at = payload.registered_at.unwrap_or_else(Utc::now);

        // 全量覆盖的文档：缺失的可选字段不写入
        let mut data = serde_json::Map::new();
        data.insert("name".into(), json!(payload.name.trim()));
        data.insert("bloodGroup".into(), json!(blood_group));
        data.insert("isAvailable".into(), json!(payload.is_available));
        data.insert(
            "notificationsEnabled".into(),
            json!(payload.notifications_enabled),
        );
        data.insert("registeredAt".into(), json!(registered_at));
        if let Some(email) = &email {
            data.insert("email".into(), json!(email));
        }
        if let Some(phone) = &phone {
            data.insert("phone".into(), json!(phone));
        }
        if let Some(location) = payload.location.as_deref().filter(|l| !l.trim().is_empty()) {
            data.insert("location".into(), json!(location.trim()));
        }
        if let Some(subscription) = &payload.push_subscription {
            data.insert("pushSubscription".into(), serde_json::to_value(subscription)?);
        }

        let mut response = self
            .db
            .query_with_params(
                UPSERT_DONOR_SQL,
                json!({
                    "phone": phone.as_deref().unwrap_or(""),
                    "email": email.as_deref().unwrap_or(""),
                    "new_id": Uuid::new_v4().simple().to_string(),
                    "data": data,
                }),
            )
            .await?;

        let errors = Database::statement_errors(&mut response);
        if errors
            .iter()
            .any(|e| e.to_string().contains("donor_contact_conflict"))
        {
            return Err(AppError::conflict(
                "Phone and email belong to different registered donors",
            ));
        }
        if let Some(error) = errors.into_iter().next() {
            return Err(AppError::Database(error));
        }

        self.find_by_contact(phone.as_deref(), email.as_deref())
            .await?
            .ok_or_else(|| AppError::internal("Donor upsert returned no record"))
    }

    /// 按电话查找捐献者，其次按邮箱
    pub async fn find_by_contact(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Donor>> {
        let mut response = self
            .db
            .query_with_params(
                r#"
                    SELECT *, type::string(id) AS id FROM donor
                    WHERE ($phone != '' AND phone = $phone) OR ($email != '' AND email = $email)
                "#,
                json!({
                    "phone": phone.unwrap_or(""),
                    "email": email.unwrap_or(""),
                }),
            )
            .await?;

        let donors: Vec<Donor> = response.take(0)?;
        // 电话命中优先于邮箱命中
        if let Some(phone) = phone {
            if let Some(donor) = donors.iter().find(|d| d.phone.as_deref() == Some(phone)) {
                return Ok(Some(donor.clone()));
            }
        }
        Ok(donors.into_iter().next())
    }

    /// 返回血型在给定集合内的捐献者，可按可用性和推送订阅过滤，顺序不保证
    pub async fn find_by_compatible_groups(
        &self,
        groups: &[String],
        require_available: bool,
        require_subscription: bool,
    ) -> Result<Vec<Donor>> {
        let mut response = self
            .db
            .query_with_params(
                r#"
                    SELECT *, type::string(id) AS id FROM donor
                    WHERE bloodGroup IN $groups
                    AND ($require_available = false OR isAvailable = true)
                    AND ($require_subscription = false OR pushSubscription != NONE)
                "#,
                json!({
                    "groups": groups,
                    "require_available": require_available,
                    "require_subscription": require_subscription,
                }),
            )
            .await?;

        let donors: Vec<Donor> = response.take(0)?;
        Ok(donors)
    }

    pub async fn list(&self) -> Result<Vec<Donor>> {
        let mut response = self
            .db
            .query("SELECT *, type::string(id) AS id FROM donor")
            .await?;
        let donors: Vec<Donor> = response.take(0)?;
        Ok(donors)
    }

    pub async fn count(&self) -> Result<usize> {
        self.db.count("donor", None).await
    }
}
