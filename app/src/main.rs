use anyhow::Result;
use api_client::{
    http::HttpApiClient, mock::MockApi, MarketplaceApi, SessionContext, SessionHandle,
};
use sokoni_app::{commands, poll};
use sokoni_core::lifecycle::MissionStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn create_api_client(session: &SessionHandle) -> Result<Arc<dyn MarketplaceApi>> {
    let cfg = config::load().unwrap_or_default();

    match cfg.api.kind.as_str() {
        "http" => {
            let base_url = cfg
                .api
                .base_url
                .ok_or_else(|| anyhow::anyhow!("api.base_url not configured"))?;

            tracing::info!(%base_url, "using HTTP marketplace API");
            Ok(HttpApiClient::new(base_url, session.clone()))
        }
        _ => {
            tracing::info!("using mock marketplace API");
            Ok(MockApi::with_demo_data())
        }
    }
}

async fn restore_session(session: &SessionHandle) {
    match config::get_secret(config::SESSION_SECRET_KEY) {
        Ok(serialized) => match serde_json::from_str::<SessionContext>(&serialized) {
            Ok(ctx) => {
                tracing::info!(user_id = ctx.user_id, "session restored from keychain");
                session.replace(ctx).await;
            }
            Err(e) => tracing::warn!(error = %e, "stored session is unreadable, ignoring"),
        },
        Err(_) => tracing::debug!("no stored session"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = config::load().unwrap_or_default();
    let session = SessionHandle::new();
    let api = create_api_client(&session)?;

    let data_dir = cfg.storage.data_dir();
    std::fs::create_dir_all(&data_dir)?;
    checkout::init(
        api.clone(),
        &data_dir.join("payments"),
        data_dir.join("escrow_audit.jsonl"),
    )?;
    let cache = offline_cache::OfflineCache::open(&data_dir.join("offline"))?;

    restore_session(&session).await;

    // Headless smoke pass over the mission board and catalogue.
    match commands::list_missions_cached(api.as_ref(), &cache).await {
        Ok(missions) => {
            let open = missions
                .iter()
                .filter(|m| m.status == MissionStatus::Open)
                .count();
            tracing::info!(total = missions.len(), open, "mission board loaded");
        }
        Err(e) => tracing::warn!(error = %e, "mission board unavailable"),
    }

    match commands::list_products(api.as_ref()).await {
        Ok(products) => tracing::info!(count = products.len(), "catalogue loaded"),
        Err(e) => tracing::warn!(error = %e, "catalogue unavailable"),
    }

    if let Ok(payments) = checkout::list_payments() {
        tracing::info!(count = payments.len(), "escrow records on file");
    }

    // Against the mock backend, also walk the demo conversation: one gated
    // refresh, one confirmed send, then a short run of the interval poller.
    if cfg.api.kind != "http" {
        let gate = Arc::new(poll::PollGate::new());
        let view = Arc::new(RwLock::new(poll::ConversationView::new(1)));
        {
            let mut guard = view.write().await;
            match poll::refresh_once(api.as_ref(), &gate, &mut guard).await {
                Ok(_) => tracing::info!(messages = guard.messages.len(), "conversation loaded"),
                Err(e) => tracing::warn!(error = %e, "conversation unavailable"),
            }
            if poll::send_and_append(api.as_ref(), &mut guard, "Bien reçu, je regarde.")
                .await
                .is_ok()
            {
                tracing::info!(messages = guard.messages.len(), "message confirmed");
            }
        }

        let poller = tokio::spawn(poll::run_poller(
            api.clone(),
            gate.clone(),
            view.clone(),
            cfg.polling.conversation_interval_secs,
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        poller.abort();
        tracing::info!(
            messages = view.read().await.messages.len(),
            "conversation snapshot"
        );
    }

    Ok(())
}
