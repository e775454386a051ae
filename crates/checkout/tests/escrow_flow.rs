//! End-to-end escrow scenarios driven through the mock backend: accept an
//! application, follow the checkout redirect contract, come back through
//! the callback page, and check what was (and was not) mutated.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use std::sync::Arc;

use api_client::mock::MockApi;
use api_client::MarketplaceApi;
use checkout::{CallbackParams, CheckoutFlow, PaymentOutcome};
use sokoni_core::lifecycle::MissionStatus;
use sokoni_core::models::{Application, DeliveryUpload, Mission, OrderStatus};

fn open_mission_with_application() -> Mission {
    Mission {
        id: 1,
        owner_id: 10,
        title: "Refonte du site".to_string(),
        description: "Cinq pages responsives".to_string(),
        category: "web".to_string(),
        budget_xof: 80_000,
        final_price_xof: None,
        status: MissionStatus::Open,
        applications: vec![Application {
            id: 1,
            mission_id: 1,
            seller_id: 20,
            proposal: "Livraison sous dix jours".to_string(),
            proposed_price_xof: 5_000,
            accepted: false,
        }],
        delivery: None,
        deadline: None,
        created_at: Utc::now(),
    }
}

fn callback_url(order_id: &str) -> String {
    format!(
        "https://app.sokoni.example/payment/callback?transaction_id=txn-1&order_id={order_id}"
    )
}

#[tokio::test]
async fn redirect_target_is_the_server_url_verbatim() {
    let api = Arc::new(MockApi::bare().with_checkout_url("https://pay.example/x"));
    api.seed_mission(open_mission_with_application()).await;
    let flow = CheckoutFlow::temporary(api.clone()).unwrap();

    let redirect = flow.initiate(1, 1).await.unwrap();
    assert_eq!(redirect.checkout_url, "https://pay.example/x");

    // Accepting moved the mission into escrow and set the final price.
    let mission = api.get_mission(1).await.unwrap();
    assert_eq!(mission.status, MissionStatus::PendingPayment);
    assert_eq!(mission.final_price_xof, Some(5_000));
    assert!(mission.applications[0].accepted);

    let record = flow.payment(&redirect.order_id).unwrap().unwrap();
    assert_eq!(record.state, "initiated");
    assert_eq!(record.checkout_url.as_deref(), Some("https://pay.example/x"));
}

#[tokio::test]
async fn successful_callback_updates_the_order_and_releases_the_mission() {
    let api = MockApi::new();
    api.seed_mission(open_mission_with_application()).await;
    let flow = CheckoutFlow::temporary(api.clone()).unwrap();

    let redirect = flow.initiate(1, 1).await.unwrap();
    let params = CallbackParams::from_url(&callback_url(&redirect.order_id)).unwrap();

    let outcome = flow.handle_callback(&params).await.unwrap();
    assert_eq!(
        outcome,
        PaymentOutcome::Success {
            order_id: redirect.order_id.clone()
        }
    );

    // Exactly one order mutation, for that order, to paid.
    assert_eq!(
        api.recorded_order_updates().await,
        vec![(redirect.order_id.clone(), OrderStatus::Paid)]
    );
    assert_eq!(
        api.order(&redirect.order_id).await.unwrap().status,
        OrderStatus::Paid
    );
    assert_eq!(
        api.get_mission(1).await.unwrap().status,
        MissionStatus::InProgress
    );

    let record = flow.payment(&redirect.order_id).unwrap().unwrap();
    assert_eq!(record.state, "verified");
    assert_eq!(record.transaction_id.as_deref(), Some("txn-1"));

    let audit = std::fs::read_to_string(flow.audit_path()).unwrap();
    assert!(audit.contains("escrow_initiated"));
    assert!(audit.contains("payment_verified"));
}

#[tokio::test]
async fn rejected_verification_mutates_no_order() {
    let api = Arc::new(MockApi::bare().with_failing_verification());
    api.seed_mission(open_mission_with_application()).await;
    let flow = CheckoutFlow::temporary(api.clone()).unwrap();

    let redirect = flow.initiate(1, 1).await.unwrap();
    let params = CallbackParams::from_url(&callback_url(&redirect.order_id)).unwrap();

    let outcome = flow.handle_callback(&params).await.unwrap();
    assert!(!outcome.is_success());
    assert_eq!(outcome.next_route(), "/");

    assert!(api.recorded_order_updates().await.is_empty());
    assert_eq!(
        api.order(&redirect.order_id).await.unwrap().status,
        OrderStatus::Pending
    );
    assert_eq!(
        api.get_mission(1).await.unwrap().status,
        MissionStatus::PendingPayment
    );

    let record = flow.payment(&redirect.order_id).unwrap().unwrap();
    assert_eq!(record.state, "failed");
    assert!(record.last_error.is_some());
}

#[tokio::test]
async fn unconfirmed_status_counts_as_failure() {
    let api = Arc::new(MockApi::bare().with_verification_status("pending"));
    api.seed_mission(open_mission_with_application()).await;
    let flow = CheckoutFlow::temporary(api.clone()).unwrap();

    let redirect = flow.initiate(1, 1).await.unwrap();
    let params = CallbackParams::from_url(&callback_url(&redirect.order_id)).unwrap();

    let outcome = flow.handle_callback(&params).await.unwrap();
    match outcome {
        PaymentOutcome::Failed { message } => assert!(message.contains("pending")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(api.recorded_order_updates().await.is_empty());
}

#[tokio::test]
async fn a_mission_escrow_can_only_be_initiated_once() {
    let api = MockApi::new();
    api.seed_mission(open_mission_with_application()).await;
    let flow = CheckoutFlow::temporary(api.clone()).unwrap();

    flow.initiate(1, 1).await.unwrap();
    assert!(flow.initiate(1, 1).await.is_err());
}

#[tokio::test]
async fn escrow_runs_through_to_completion() {
    let api = MockApi::new();
    api.seed_mission(open_mission_with_application()).await;
    let flow = CheckoutFlow::temporary(api.clone()).unwrap();

    let redirect = flow.initiate(1, 1).await.unwrap();
    let params = CallbackParams::from_url(&callback_url(&redirect.order_id)).unwrap();
    flow.handle_callback(&params).await.unwrap();

    let content = b"rapport final";
    let upload = DeliveryUpload {
        file_name: "rapport.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        size_bytes: content.len() as u64,
        sha256: "0".repeat(64),
        note: "Version finale".to_string(),
        content_base64: BASE64.encode(content),
    };
    api.submit_delivery(1, &upload).await.unwrap();
    assert_eq!(
        api.get_mission(1).await.unwrap().status,
        MissionStatus::AwaitingValidation
    );

    let mission = api.validate_delivery(1).await.unwrap();
    assert_eq!(mission.status, MissionStatus::Completed);
    flow.record_delivery_validated(1).unwrap();

    assert_eq!(api.download_delivery(1).await.unwrap(), content.to_vec());

    let audit = std::fs::read_to_string(flow.audit_path()).unwrap();
    assert!(audit.contains("delivery_validated"));
}
