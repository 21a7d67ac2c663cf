use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use lifelink::config::Config;
use lifelink::error::{AppError, Result};
use lifelink::models::donor::{PushSubscription, RegisterDonorPayload};
use lifelink::models::request::{
    RequestStatus, ResolveRequestPayload, RevealCodePayload, SubmitRequestPayload,
};
use lifelink::services::notification::{NotificationService, PushDelivery, PushPayload};
use lifelink::services::{Database, DonorService, MessageService, RequestService};

/// Push delivery stub that records every dispatch instead of sending it.
#[derive(Default)]
struct RecordingDelivery {
    sent: Mutex<Vec<(String, PushPayload)>>,
}

impl RecordingDelivery {
    fn sent(&self) -> Vec<(String, PushPayload)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushDelivery for RecordingDelivery {
    async fn deliver(&self, subscription: &PushSubscription, payload: &PushPayload) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.clone()));
        Ok(())
    }
}

struct TestApp {
    donors: DonorService,
    requests: RequestService,
    messages: MessageService,
    delivery: Arc<RecordingDelivery>,
}

/// Fresh service stack over an isolated in-memory database.
async fn test_app() -> TestApp {
    let config = Config::default();
    let db = Arc::new(Database::new(&config).await.expect("connect mem database"));
    db.define_schema().await.expect("define schema");

    let delivery = Arc::new(RecordingDelivery::default());
    let notifications = NotificationService::with_delivery(delivery.clone());
    let donors = DonorService::new(db.clone()).await.expect("donor service");
    let messages = MessageService::new(db.clone()).await.expect("message service");
    let requests = RequestService::new(
        db.clone(),
        donors.clone(),
        notifications,
        messages.clone(),
    )
    .await
    .expect("request service");

    TestApp {
        donors,
        requests,
        messages,
        delivery,
    }
}

fn donor_payload(value: serde_json::Value) -> RegisterDonorPayload {
    serde_json::from_value(value).expect("donor payload")
}

fn request_payload(value: serde_json::Value) -> SubmitRequestPayload {
    serde_json::from_value(value).expect("request payload")
}

fn resolve_payload(value: serde_json::Value) -> ResolveRequestPayload {
    serde_json::from_value(value).expect("resolve payload")
}

fn subscription(endpoint: &str) -> serde_json::Value {
    json!({
        "endpoint": endpoint,
        "expirationTime": null,
        "keys": {"p256dh": "p256dh-key", "auth": "auth-secret"}
    })
}

#[tokio::test]
async fn register_requires_contact_identity() {
    let app = test_app().await;

    let err = app
        .donors
        .register_or_update(donor_payload(json!({
            "name": "No Contact",
            "bloodGroup": "A+"
        })))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn register_upserts_by_phone() {
    let app = test_app().await;

    let first = app
        .donors
        .register_or_update(donor_payload(json!({
            "name": "Asha",
            "phone": "111",
            "bloodGroup": "O-",
            "location": "Pune"
        })))
        .await
        .unwrap();

    // Re-registration with the same phone fully replaces the record
    let second = app
        .donors
        .register_or_update(donor_payload(json!({
            "name": "Asha K",
            "phone": "111",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Asha K");
    assert_eq!(second.location, None, "full replace, not merge");
    assert_eq!(app.donors.count().await.unwrap(), 1);
}

#[tokio::test]
async fn register_upserts_by_email_when_phone_absent() {
    let app = test_app().await;

    let first = app
        .donors
        .register_or_update(donor_payload(json!({
            "name": "Ravi",
            "email": "Ravi@Example.com",
            "bloodGroup": "B+"
        })))
        .await
        .unwrap();

    let second = app
        .donors
        .register_or_update(donor_payload(json!({
            "name": "Ravi",
            "email": "ravi@example.com",
            "bloodGroup": "B-"
        })))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.blood_group, "B-");
    assert_eq!(app.donors.count().await.unwrap(), 1);
}

#[tokio::test]
async fn register_rejects_contacts_split_across_two_donors() {
    let app = test_app().await;

    app.donors
        .register_or_update(donor_payload(json!({
            "name": "A",
            "phone": "111",
            "email": "a@example.com",
            "bloodGroup": "A+"
        })))
        .await
        .unwrap();
    app.donors
        .register_or_update(donor_payload(json!({
            "name": "B",
            "phone": "222",
            "email": "b@example.com",
            "bloodGroup": "B+"
        })))
        .await
        .unwrap();

    // Phone belongs to A, email belongs to B
    let err = app
        .donors
        .register_or_update(donor_payload(json!({
            "name": "C",
            "phone": "111",
            "email": "b@example.com",
            "bloodGroup": "O+"
        })))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);
}

#[tokio::test]
async fn duplicate_pending_request_is_rejected() {
    let app = test_app().await;

    app.requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "phone": "555",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap();

    let err = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "phone": "555",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Duplicate(_)), "got {:?}", err);
}

#[tokio::test]
async fn resolved_request_frees_the_pending_pair() {
    let app = test_app().await;

    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "phone": "555",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap();

    app.requests
        .resolve(
            &outcome.request.id,
            resolve_payload(json!({"manageCode": outcome.request.manage_code})),
        )
        .await
        .unwrap();

    // 同一 (phone, bloodGroup) 的新请求在旧请求接受后允许再次提交
    app.requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "phone": "555",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap();
}

#[tokio::test]
async fn manage_code_is_six_decimal_digits() {
    let app = test_app().await;

    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "phone": "555",
            "bloodGroup": "A-"
        })))
        .await
        .unwrap();

    let code = &outcome.request.manage_code;
    assert_eq!(code.len(), 6);
    let value: u32 = code.parse().expect("decimal code");
    assert!((100_000..=999_999).contains(&value));
}

#[tokio::test]
async fn resolve_accepts_code_with_mismatched_contact() {
    let app = test_app().await;

    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "email": "meera@example.com",
            "phone": "555",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap();

    let resolved = app
        .requests
        .resolve(
            &outcome.request.id,
            resolve_payload(json!({
                "manageCode": outcome.request.manage_code,
                "email": "wrong@example.com",
                "phone": "000"
            })),
        )
        .await
        .unwrap();

    assert_eq!(resolved.status, RequestStatus::Accepted);
    assert!(resolved.resolved_at.is_some());
}

#[tokio::test]
async fn resolve_accepts_matching_contact_without_code() {
    let app = test_app().await;

    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "email": "meera@example.com",
            "phone": "555",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap();

    let resolved = app
        .requests
        .resolve(
            &outcome.request.id,
            resolve_payload(json!({
                "email": "meera@example.com",
                "phone": "555"
            })),
        )
        .await
        .unwrap();

    assert_eq!(resolved.status, RequestStatus::Accepted);
}

#[tokio::test]
async fn resolve_rejects_bad_credentials() {
    let app = test_app().await;

    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "email": "meera@example.com",
            "phone": "555",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap();

    let err = app
        .requests
        .resolve(
            &outcome.request.id,
            resolve_payload(json!({
                "manageCode": "000000",
                "email": "wrong@example.com",
                "phone": "555"
            })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "got {:?}", err);

    // email matches but phone does not: contact path needs both
    let err = app
        .requests
        .resolve(
            &outcome.request.id,
            resolve_payload(json!({
                "email": "meera@example.com",
                "phone": "999"
            })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "got {:?}", err);

    let still_pending = app.requests.get(&outcome.request.id).await.unwrap();
    assert_eq!(still_pending.status, RequestStatus::Pending);
}

#[tokio::test]
async fn resolve_unknown_request_is_not_found() {
    let app = test_app().await;

    let err = app
        .requests
        .resolve(
            "request:doesnotexist",
            resolve_payload(json!({"manageCode": "123456"})),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn reveal_code_requires_exact_contact_match() {
    let app = test_app().await;

    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "email": "meera@example.com",
            "phone": "555",
            "bloodGroup": "AB-"
        })))
        .await
        .unwrap();

    let err = app
        .requests
        .reveal_code(
            &outcome.request.id,
            RevealCodePayload {
                email: "meera@example.com".to_string(),
                phone: "999".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "got {:?}", err);

    let code = app
        .requests
        .reveal_code(
            &outcome.request.id,
            RevealCodePayload {
                email: "Meera@Example.com".to_string(),
                phone: "555".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(code, outcome.request.manage_code);
}

#[tokio::test]
async fn end_to_end_submit_then_resolve_with_code() {
    let app = test_app().await;

    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "email": "meera@example.com",
            "phone": "555",
            "bloodGroup": "O-",
            "hospitalName": "City Hospital",
            "urgency": "urgent"
        })))
        .await
        .unwrap();

    assert_eq!(outcome.request.status, RequestStatus::Pending);
    let code = outcome.request.manage_code.clone();
    assert_eq!(code.len(), 6);

    let resolved = app
        .requests
        .resolve(
            &outcome.request.id,
            resolve_payload(json!({
                "manageCode": code,
                "donorDetails": {"name": "Asha", "phone": "111"}
            })),
        )
        .await
        .unwrap();

    assert_eq!(resolved.status, RequestStatus::Accepted);
    assert!(resolved.resolved_at.is_some());
    assert_eq!(resolved.donor_details.unwrap().name, "Asha");

    // Poller observes the terminal state
    let fetched = app.requests.get(&outcome.request.id).await.unwrap();
    assert_eq!(fetched.status, RequestStatus::Accepted);

    // Donor-found notice lands in the requester's message feed
    let feed = app
        .messages
        .list_for_receiver("meera@example.com")
        .await
        .unwrap();
    assert_eq!(feed.len(), 1);
    assert!(feed[0].content.contains("O-"));
    assert!(feed[0].content.contains("City Hospital"));
}

#[tokio::test]
async fn compatible_donors_are_notified() {
    let app = test_app().await;

    app.donors
        .register_or_update(donor_payload(json!({
            "name": "Asha",
            "phone": "111",
            "bloodGroup": "O-",
            "notificationsEnabled": true,
            "pushSubscription": subscription("https://push.example/o-neg")
        })))
        .await
        .unwrap();

    // O- donors are compatible with AB+ recipients
    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "phone": "555",
            "bloodGroup": "AB+",
            "hospitalName": "City Hospital"
        })))
        .await
        .unwrap();
    assert_eq!(outcome.notified_donors, 1);

    let sent = app.delivery.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "https://push.example/o-neg");
    assert!(sent[0].1.body.contains("AB+"));
    assert!(sent[0].1.body.contains("City Hospital"));

    // ...and with A- recipients as well
    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Kiran",
            "phone": "556",
            "bloodGroup": "A-"
        })))
        .await
        .unwrap();
    assert_eq!(outcome.notified_donors, 1);
    assert_eq!(app.delivery.sent().len(), 2);
}

#[tokio::test]
async fn incompatible_donor_is_not_notified() {
    let app = test_app().await;

    app.donors
        .register_or_update(donor_payload(json!({
            "name": "Vikram",
            "phone": "222",
            "bloodGroup": "A+",
            "notificationsEnabled": true,
            "pushSubscription": subscription("https://push.example/a-pos")
        })))
        .await
        .unwrap();

    // A+ donors cannot donate to an O- recipient
    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "phone": "555",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap();

    assert_eq!(outcome.notified_donors, 0);
    assert!(app.delivery.sent().is_empty());
}

#[tokio::test]
async fn opted_out_and_unsubscribed_donors_are_skipped() {
    let app = test_app().await;

    // Compatible but opted out
    app.donors
        .register_or_update(donor_payload(json!({
            "name": "Quiet",
            "phone": "333",
            "bloodGroup": "O-",
            "notificationsEnabled": false,
            "pushSubscription": subscription("https://push.example/quiet")
        })))
        .await
        .unwrap();

    // Compatible but never subscribed
    app.donors
        .register_or_update(donor_payload(json!({
            "name": "Unsubscribed",
            "phone": "444",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap();

    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "phone": "555",
            "bloodGroup": "AB+"
        })))
        .await
        .unwrap();

    assert_eq!(outcome.notified_donors, 0);
    assert!(app.delivery.sent().is_empty());
}

#[tokio::test]
async fn legacy_alias_payload_produces_canonical_record() {
    let app = test_app().await;

    let outcome = app
        .requests
        .submit(request_payload(json!({
            "receiverName": "Meera",
            "requiredBloodGroup": "ab+",
            "hospital": "City Hospital",
            "phone": "555",
            "status": "pending"
        })))
        .await
        .unwrap();

    assert_eq!(outcome.request.requester_name, "Meera");
    assert_eq!(outcome.request.blood_group, "AB+");
    assert_eq!(
        outcome.request.hospital_name.as_deref(),
        Some("City Hospital")
    );
    assert_eq!(outcome.request.status, RequestStatus::Pending);
}

#[tokio::test]
async fn stats_track_donors_and_open_requests() {
    let app = test_app().await;

    app.donors
        .register_or_update(donor_payload(json!({
            "name": "Asha",
            "phone": "111",
            "bloodGroup": "O-"
        })))
        .await
        .unwrap();

    let outcome = app
        .requests
        .submit(request_payload(json!({
            "requesterName": "Meera",
            "phone": "555",
            "bloodGroup": "B+"
        })))
        .await
        .unwrap();

    assert_eq!(app.donors.count().await.unwrap(), 1);
    assert_eq!(app.requests.count_open().await.unwrap(), 1);

    app.requests
        .resolve(
            &outcome.request.id,
            resolve_payload(json!({"manageCode": outcome.request.manage_code})),
        )
        .await
        .unwrap();

    assert_eq!(app.requests.count_open().await.unwrap(), 0);
    assert_eq!(app.requests.list(false).await.unwrap().len(), 1);
    assert!(app.requests.list(true).await.unwrap().is_empty());
}
