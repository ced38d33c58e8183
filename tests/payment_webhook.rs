//! Webhook settlement against a live database: the happy path, an invalid
//! signature, and idempotent replay of the same webhook. Only the webhook
//! leg is exercised here — `create_payment_request` calls the real PayPlus
//! API over the network, which `src/payments/service.rs`'s own unit test
//! already sidesteps by testing `calculate_vat` directly instead.

mod common;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use pazpaz::appointments::{AppointmentRepository, PaymentStatus};
use pazpaz::clients::ClientRepository;
use pazpaz::ids::{ClientId, PaymentTransactionId};
use pazpaz::kv::memory_store::InMemoryFastStore;
use pazpaz::kv::FastStore;
use pazpaz::payments::service::{NoopNotifier, PaymentService};
use pazpaz::payments::{PaymentTransaction, PaymentTransactionRepository, TransactionStatus};
use rust_decimal::Decimal;
use sha2::Sha256;
use time::macros::datetime;

const WEBHOOK_SECRET: &str = "whsec-test-secret";

fn payplus_workspace(id: pazpaz::ids::WorkspaceId) -> pazpaz::workspace::Workspace {
    pazpaz::workspace::Workspace {
        id,
        name: "Test Workspace".to_string(),
        status: pazpaz::workspace::WorkspaceStatus::Active,
        payment_config: pazpaz::workspace::PaymentConfig {
            provider: Some("payplus".to_string()),
            provider_config: serde_json::json!({
                "api_key": "key",
                "payment_page_uid": "page-uid",
                "webhook_secret": WEBHOOK_SECRET,
            }),
            vat_rate: Decimal::from_str("17.00").unwrap(),
            vat_registered: true,
            payments_enabled: true,
            currency: "ILS".to_string(),
        },
        receipt_counter: 0,
    }
}

fn signed_body(body: &[u8]) -> HashMap<String, String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body);
    let signature = hex::encode(mac.finalize().into_bytes());
    let mut headers = HashMap::new();
    headers.insert("x-payplus-signature".to_string(), format!("sha256={signature}"));
    headers
}

async fn service(pool: sqlx::PgPool) -> (PaymentService, PaymentTransactionRepository) {
    let transactions = PaymentTransactionRepository::new(pool.clone());
    let store: Arc<dyn FastStore> = Arc::new(InMemoryFastStore::new());
    let keyring = common::test_keyring();
    let service = PaymentService::new(
        pool.clone(),
        PaymentTransactionRepository::new(pool.clone()),
        AppointmentRepository::new(pool.clone()),
        ClientRepository::new(pool.clone(), keyring),
        pazpaz::workspace::WorkspaceRepository::new(pool),
        store,
        Arc::new(NoopNotifier),
    );
    (service, transactions)
}

async fn seed_pending_transaction(
    pool: &sqlx::PgPool,
    workspace_id: pazpaz::ids::WorkspaceId,
    appointment_id: pazpaz::ids::AppointmentId,
    provider_transaction_id: &str,
) -> PaymentTransactionId {
    let transactions = PaymentTransactionRepository::new(pool.clone());
    let transaction = PaymentTransaction {
        id: PaymentTransactionId::new(),
        workspace_id,
        appointment_id: Some(appointment_id),
        base_amount: Decimal::from_str("100.00").unwrap(),
        vat_amount: Decimal::from_str("17.00").unwrap(),
        total_amount: Decimal::from_str("117.00").unwrap(),
        currency: "ILS".to_string(),
        payment_method: "online_card".to_string(),
        status: TransactionStatus::Pending,
        provider: "payplus".to_string(),
        provider_transaction_id: Some(provider_transaction_id.to_string()),
        provider_payment_link: Some("https://pay.example/x".to_string()),
        receipt_number: None,
        created_at: pazpaz::time_util::now(),
        completed_at: None,
        failed_at: None,
        refunded_at: None,
        failure_reason: None,
        provider_metadata: None,
    };
    let mut tx = pool.begin().await.unwrap();
    transactions.insert(&mut tx, &transaction).await.unwrap();
    tx.commit().await.unwrap();
    transaction.id
}

#[tokio::test]
async fn webhook_happy_path_settles_transaction_and_appointment_then_is_idempotent() {
    let Some(pool) = common::setup_db().await else { return };
    let workspace_fixture = common::WorkspaceFixture { payment_provider: Some("payplus"), ..Default::default() };
    common::insert_workspace(&pool, &workspace_fixture).await;
    let workspace = payplus_workspace(workspace_fixture.id);
    let client_id = ClientId::new();
    let appointment_id = common::insert_appointment(
        &pool,
        workspace.id,
        client_id,
        datetime!(2025-03-01 09:00 UTC),
        datetime!(2025-03-01 10:00 UTC),
        "scheduled",
        Some(Decimal::from_str("117.00").unwrap()),
    )
    .await;

    seed_pending_transaction(&pool, workspace.id, appointment_id, "page-req-1").await;

    let (service, transactions) = service(pool.clone()).await;
    let body = br#"{"page_request_uid":"page-req-1","status":"completed","amount":117.00,"currency_code":"ILS"}"#;
    let headers = signed_body(body);

    let result = service.process_webhook(&workspace, body, &headers).await.unwrap();
    assert_eq!(result.status, TransactionStatus::Completed);
    assert!(result.completed_at.is_some());
    assert_eq!(result.receipt_number, Some(1));

    let appointments = AppointmentRepository::new(pool.clone());
    let appointment = appointments.find(workspace.id, appointment_id).await.unwrap();
    assert_eq!(appointment.payment_status, PaymentStatus::Paid);
    assert!(appointment.paid_at.is_some());

    // Second identical webhook: no further state change, same terminal result.
    let replay = service.process_webhook(&workspace, body, &headers).await.unwrap();
    assert_eq!(replay.status, TransactionStatus::Completed);
    assert_eq!(replay.completed_at, result.completed_at);
    assert_eq!(replay.receipt_number, Some(1));

    let stored = transactions.find(workspace.id, result.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn webhook_with_invalid_signature_is_rejected_and_leaves_transaction_untouched() {
    let Some(pool) = common::setup_db().await else { return };
    let workspace_fixture = common::WorkspaceFixture { payment_provider: Some("payplus"), ..Default::default() };
    common::insert_workspace(&pool, &workspace_fixture).await;
    let workspace = payplus_workspace(workspace_fixture.id);
    let client_id = ClientId::new();
    let appointment_id = common::insert_appointment(
        &pool,
        workspace.id,
        client_id,
        datetime!(2025-03-02 09:00 UTC),
        datetime!(2025-03-02 10:00 UTC),
        "scheduled",
        Some(Decimal::from_str("117.00").unwrap()),
    )
    .await;
    let transaction_id = seed_pending_transaction(&pool, workspace.id, appointment_id, "page-req-2").await;

    let (service, transactions) = service(pool.clone()).await;
    let body = br#"{"page_request_uid":"page-req-2","status":"completed","amount":117.00,"currency_code":"ILS"}"#;
    let mut headers = HashMap::new();
    headers.insert("x-payplus-signature".to_string(), "sha256=deadbeef".to_string());

    let result = service.process_webhook(&workspace, body, &headers).await;
    assert!(result.is_err());

    let stored = transactions.find(workspace.id, transaction_id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);

    let appointments = AppointmentRepository::new(pool.clone());
    let appointment = appointments.find(workspace.id, appointment_id).await.unwrap();
    assert_eq!(appointment.payment_status, PaymentStatus::Unpaid);
}
