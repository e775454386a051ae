//! Escrow checkout flow, client side. Accepting an application asks the
//! server for an order and a hosted checkout URL; the provider's return
//! URL is verified through the server before any order is touched. One
//! verify call per callback, no retry loop, no idempotency keys: the
//! server alone decides whether funds moved.

mod audit;
pub mod callback;

pub use audit::AuditEvent;
pub use callback::{CallbackParams, PaymentOutcome};

use anyhow::{anyhow, Context, Result};
use api_client::{CheckoutRedirect, MarketplaceApi};
use audit::write_audit_event;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use sled::Db;
use sokoni_core::models::{ApplicationId, MissionId, OrderStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;

static GLOBAL_FLOW: OnceCell<Arc<CheckoutFlow>> = OnceCell::new();

/// Local bookkeeping of one escrow order. States: `initiated` (redirect
/// handed out), `verified`, `failed`. This is display data for the buyer
/// dashboard, never an authority on whether funds moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub order_id: String,
    pub mission_id: Option<MissionId>,
    pub application_id: Option<ApplicationId>,
    pub state: String,
    pub checkout_url: Option<String>,
    pub transaction_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct CheckoutFlow {
    db: Db,
    api: Arc<dyn MarketplaceApi + 'static>,
    audit_path: PathBuf,
}

impl CheckoutFlow {
    pub fn new(db: Db, api: Arc<dyn MarketplaceApi + 'static>, audit_path: PathBuf) -> Self {
        Self {
            db,
            api,
            audit_path,
        }
    }

    /// Throwaway flow for tests: in-memory sled, audit file under the
    /// system temp directory.
    pub fn temporary(api: Arc<dyn MarketplaceApi + 'static>) -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let audit_path = std::env::temp_dir().join(format!(
            "sokoni-escrow-audit-{}.jsonl",
            uuid::Uuid::new_v4()
        ));
        Ok(Self::new(db, api, audit_path))
    }

    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }

    fn payments_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("payments")?)
    }

    /// Accept an application and hand back the hosted checkout URL,
    /// verbatim as the server returned it. Nothing is recorded unless
    /// both server calls succeeded.
    pub async fn initiate(
        &self,
        mission_id: MissionId,
        application_id: ApplicationId,
    ) -> Result<CheckoutRedirect> {
        let order = self
            .api
            .accept_application(mission_id, application_id)
            .await
            .context("failed to accept application")?;

        let redirect = self
            .api
            .initiate_checkout(&order.id)
            .await
            .context("failed to initiate checkout")?;

        let now = Utc::now();
        let record = PaymentRecord {
            order_id: redirect.order_id.clone(),
            mission_id: Some(mission_id),
            application_id: Some(application_id),
            state: "initiated".to_string(),
            checkout_url: Some(redirect.checkout_url.clone()),
            transaction_id: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        let tree = self.payments_tree()?;
        tree.insert(record.order_id.as_bytes(), serde_json::to_vec(&record)?)?;

        let _ = write_audit_event(
            &self.audit_path,
            &AuditEvent::new("escrow_initiated", "initiated")
                .with_order_id(redirect.order_id.clone())
                .with_mission_id(mission_id),
        );

        tracing::info!(
            mission_id,
            application_id,
            order_id = %redirect.order_id,
            "escrow initiated, redirecting to checkout"
        );
        Ok(redirect)
    }

    /// The callback page: verify once through the server and reflect the
    /// answer. On anything but a confirmed success, no order mutation is
    /// attempted.
    pub async fn handle_callback(&self, params: &CallbackParams) -> Result<PaymentOutcome> {
        let tree = self.payments_tree()?;

        match self.api.verify_transaction(&params.transaction_id).await {
            Ok(outcome) if outcome.is_success() => {
                self.api
                    .update_order_status(&params.order_id, OrderStatus::Paid)
                    .await
                    .context("payment verified but order update failed")?;

                upsert_record(&tree, &params.order_id, |rec| {
                    rec.state = "verified".to_string();
                    rec.transaction_id = Some(params.transaction_id.clone());
                    rec.last_error = None;
                    rec.updated_at = Utc::now();
                })?;

                let _ = write_audit_event(
                    &self.audit_path,
                    &AuditEvent::new("payment_verified", "verified")
                        .with_order_id(params.order_id.clone())
                        .with_transaction_id(params.transaction_id.clone()),
                );

                tracing::info!(order_id = %params.order_id, "payment verified");
                Ok(PaymentOutcome::Success {
                    order_id: params.order_id.clone(),
                })
            }
            Ok(outcome) => {
                let message = outcome.message.clone().unwrap_or_else(|| {
                    format!("payment not confirmed (status: {})", outcome.status)
                });
                self.record_failure(&tree, params, &message)?;
                Ok(PaymentOutcome::Failed { message })
            }
            Err(err) => {
                let message = err.to_string();
                self.record_failure(&tree, params, &message)?;
                Ok(PaymentOutcome::Failed { message })
            }
        }
    }

    fn record_failure(
        &self,
        tree: &sled::Tree,
        params: &CallbackParams,
        message: &str,
    ) -> Result<()> {
        upsert_record(tree, &params.order_id, |rec| {
            rec.state = "failed".to_string();
            rec.transaction_id = Some(params.transaction_id.clone());
            rec.last_error = Some(message.to_string());
            rec.updated_at = Utc::now();
        })?;

        let _ = write_audit_event(
            &self.audit_path,
            &AuditEvent::new("payment_failed", "failed")
                .with_order_id(params.order_id.clone())
                .with_transaction_id(params.transaction_id.clone())
                .with_error(message.to_string()),
        );

        tracing::warn!(order_id = %params.order_id, error = %message, "payment verification failed");
        Ok(())
    }

    pub fn list_payments(&self) -> Result<Vec<PaymentRecord>> {
        let tree = self.payments_tree()?;
        let mut out = Vec::new();
        for item in tree.iter() {
            let (_k, v) = item?;
            let rec: PaymentRecord = serde_json::from_slice(&v)?;
            out.push(rec);
        }
        out.sort_by_key(|r| r.created_at);
        out.reverse();
        Ok(out)
    }

    pub fn payment(&self, order_id: &str) -> Result<Option<PaymentRecord>> {
        let tree = self.payments_tree()?;
        match tree.get(order_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delivery validation closes the escrow server-side; keep the trail.
    pub fn record_delivery_validated(&self, mission_id: MissionId) -> Result<()> {
        write_audit_event(
            &self.audit_path,
            &AuditEvent::new("delivery_validated", "completed").with_mission_id(mission_id),
        )
    }
}

fn upsert_record<F>(tree: &sled::Tree, order_id: &str, mut f: F) -> Result<()>
where
    F: FnMut(&mut PaymentRecord),
{
    let key = order_id.as_bytes();
    // A callback can land in a fresh process that never saw the initiate,
    // so a missing record is created rather than refused.
    let mut rec: PaymentRecord = match tree.get(key)? {
        Some(existing) => serde_json::from_slice(&existing)?,
        None => PaymentRecord {
            order_id: order_id.to_string(),
            mission_id: None,
            application_id: None,
            state: "initiated".to_string(),
            checkout_url: None,
            transaction_id: None,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
    };
    f(&mut rec);
    tree.insert(key, serde_json::to_vec(&rec)?)?;
    Ok(())
}

pub fn init(
    api: Arc<dyn MarketplaceApi + 'static>,
    db_path: &Path,
    audit_path: PathBuf,
) -> Result<()> {
    let db = sled::open(db_path)?;
    let flow = Arc::new(CheckoutFlow::new(db, api, audit_path));
    GLOBAL_FLOW
        .set(flow)
        .map_err(|_| anyhow!("checkout flow already initialized"))?;
    Ok(())
}

pub fn flow() -> Result<Arc<CheckoutFlow>> {
    GLOBAL_FLOW
        .get()
        .cloned()
        .ok_or_else(|| anyhow!("checkout flow not initialized"))
}

pub async fn initiate_escrow(
    mission_id: MissionId,
    application_id: ApplicationId,
) -> Result<CheckoutRedirect> {
    flow()?.initiate(mission_id, application_id).await
}

pub async fn handle_payment_callback(url: &str) -> Result<PaymentOutcome> {
    let params = CallbackParams::from_url(url)?;
    flow()?.handle_callback(&params).await
}

pub fn list_payments() -> Result<Vec<PaymentRecord>> {
    flow()?.list_payments()
}
