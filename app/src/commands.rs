//! Command surface of the shell: one async function per user-facing
//! action, each issuing a single remote call and answering with view data
//! or the alert text to show. Local state is only touched after a
//! successful response.

use api_client::{ApiError, MarketplaceApi, SessionContext, SessionHandle};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use offline_cache::{FetchSource, OfflineCache, OFFLINE_JSON};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sokoni_core::guards::{allowed_actions, MissionAction, Viewer};
use sokoni_core::lifecycle::MissionStatus;
use sokoni_core::models::{
    Application, ApplicationDraft, ApplicationId, Delivery, DeliveryUpload, Mission, MissionDraft,
    MissionId, Product,
};
use sokoni_core::validation::{
    validate_application_draft, validate_mission_draft, validate_withdrawal,
};
use std::path::PathBuf;
use walkdir::WalkDir;

fn user_err(e: ApiError) -> String {
    e.user_message()
}

async fn session_viewer(session: &SessionHandle) -> Result<Viewer, String> {
    session
        .viewer()
        .await
        .ok_or_else(|| "Veuillez vous connecter.".to_string())
}

pub async fn login(
    api: &dyn MarketplaceApi,
    session: &SessionHandle,
    email: &str,
    password: &str,
) -> Result<(), String> {
    let auth = api.login(email, password).await.map_err(user_err)?;
    let ctx = SessionContext {
        token: auth.token,
        user_id: auth.user.id,
        role: auth.user.role,
    };
    session.replace(ctx.clone()).await;
    // Keychain copy only exists so a later start can restore the session.
    if let Ok(serialized) = serde_json::to_string(&ctx) {
        if let Err(e) = config::store_secret(config::SESSION_SECRET_KEY, &serialized) {
            tracing::warn!(error = %e, "could not persist session to keychain");
        }
    }
    Ok(())
}

pub async fn logout(api: &dyn MarketplaceApi, session: &SessionHandle) -> Result<(), String> {
    let result = api.logout().await;
    session.clear().await;
    let _ = config::delete_secret(config::SESSION_SECRET_KEY);
    result.map_err(user_err)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionView {
    pub action: MissionAction,
    pub label: String,
}

/// What a mission card renders: badge plus the restricted action set for
/// the current viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionCard {
    pub mission_id: MissionId,
    pub title: String,
    pub status: MissionStatus,
    pub badge: String,
    pub budget_xof: i64,
    pub final_price_xof: Option<i64>,
    pub actions: Vec<ActionView>,
}

fn build_card(mission: &Mission, viewer: &Viewer) -> MissionCard {
    let actions = allowed_actions(mission, viewer)
        .into_iter()
        .map(|action| ActionView {
            label: action.label().to_string(),
            action,
        })
        .collect();
    MissionCard {
        mission_id: mission.id,
        title: mission.title.clone(),
        status: mission.status,
        badge: mission.status.badge().to_string(),
        budget_xof: mission.budget_xof,
        final_price_xof: mission.final_price_xof,
        actions,
    }
}

pub async fn mission_card(
    api: &dyn MarketplaceApi,
    session: &SessionHandle,
    mission_id: MissionId,
) -> Result<MissionCard, String> {
    let viewer = session_viewer(session).await?;
    let mission = api.get_mission(mission_id).await.map_err(user_err)?;
    Ok(build_card(&mission, &viewer))
}

/// Buyer posts a new mission. Checked locally first so the obvious 400s
/// never leave the machine.
pub async fn post_mission(
    api: &dyn MarketplaceApi,
    draft: MissionDraft,
) -> Result<Mission, String> {
    validate_mission_draft(&draft).map_err(|errs| errs.join("; "))?;
    api.create_mission(&draft).await.map_err(user_err)
}

pub async fn apply_to_mission(
    api: &dyn MarketplaceApi,
    mission_id: MissionId,
    proposal: &str,
    proposed_price_xof: i64,
) -> Result<Application, String> {
    let draft = ApplicationDraft {
        proposal: proposal.to_string(),
        proposed_price_xof,
    };
    validate_application_draft(&draft).map_err(|errs| errs.join("; "))?;
    api.apply_to_mission(mission_id, &draft)
        .await
        .map_err(user_err)
}

/// Owner accepts an application; the returned string is the browser
/// navigation target, exactly as the server handed it back.
pub async fn accept_and_redirect(
    mission_id: MissionId,
    application_id: ApplicationId,
) -> Result<String, String> {
    checkout::initiate_escrow(mission_id, application_id)
        .await
        .map(|redirect| redirect.checkout_url)
        .map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackView {
    pub state: String,
    pub message: Option<String>,
    pub next_route: String,
}

/// The payment callback page: parse the return URL, verify through the
/// server, reflect the result.
pub async fn payment_callback(url: &str) -> Result<CallbackView, String> {
    let outcome = checkout::handle_payment_callback(url)
        .await
        .map_err(|e| e.to_string())?;
    let message = match &outcome {
        checkout::PaymentOutcome::Success { .. } => None,
        checkout::PaymentOutcome::Failed { message } => Some(message.clone()),
    };
    Ok(CallbackView {
        state: outcome.display_state().to_string(),
        message,
        next_route: outcome.next_route().to_string(),
    })
}

fn mime_for(path: &str) -> &'static str {
    match PathBuf::from(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Accepted seller submits the deliverable: file is read, hashed and
/// carried base64 in the request body.
pub async fn submit_delivery(
    api: &dyn MarketplaceApi,
    mission_id: MissionId,
    path: &str,
    note: &str,
) -> Result<Delivery, String> {
    let content = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    let sha256 = hex::encode(hasher.finalize());
    let file_name = PathBuf::from(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "livrable".to_string());

    let upload = DeliveryUpload {
        mime_type: mime_for(path).to_string(),
        size_bytes: content.len() as u64,
        sha256,
        file_name,
        note: note.to_string(),
        content_base64: BASE64.encode(&content),
    };
    api.submit_delivery(mission_id, &upload)
        .await
        .map_err(user_err)
}

/// Owner validates the delivery, closing the escrow server-side.
pub async fn validate_delivery(
    api: &dyn MarketplaceApi,
    mission_id: MissionId,
) -> Result<MissionStatus, String> {
    let mission = api.validate_delivery(mission_id).await.map_err(user_err)?;
    if let Ok(flow) = checkout::flow() {
        let _ = flow.record_delivery_validated(mission_id);
    }
    Ok(mission.status)
}

pub async fn download_delivery(
    api: &dyn MarketplaceApi,
    mission_id: MissionId,
) -> Result<Vec<u8>, String> {
    api.download_delivery(mission_id).await.map_err(user_err)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerDashboard {
    pub missions: Vec<MissionCard>,
    pub payments: Vec<checkout::PaymentRecord>,
}

pub async fn buyer_dashboard(
    api: &dyn MarketplaceApi,
    session: &SessionHandle,
) -> Result<BuyerDashboard, String> {
    let viewer = session_viewer(session).await?;
    let missions = api.list_missions().await.map_err(user_err)?;
    let cards = missions
        .iter()
        .filter(|m| m.is_owner(viewer.user_id))
        .map(|m| build_card(m, &viewer))
        .collect();
    let payments = checkout::list_payments().unwrap_or_default();
    Ok(BuyerDashboard {
        missions: cards,
        payments,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerDashboard {
    pub balance_xof: i64,
    pub open_missions: Vec<MissionCard>,
    pub active_missions: Vec<MissionCard>,
}

pub async fn seller_dashboard(
    api: &dyn MarketplaceApi,
    session: &SessionHandle,
) -> Result<SellerDashboard, String> {
    let viewer = session_viewer(session).await?;
    let balance_xof = api.get_balance().await.map_err(user_err)?;
    let missions = api.list_missions().await.map_err(user_err)?;

    let open_missions = missions
        .iter()
        .filter(|m| m.status == MissionStatus::Open && !m.is_owner(viewer.user_id))
        .map(|m| build_card(m, &viewer))
        .collect();
    let active_missions = missions
        .iter()
        .filter(|m| {
            m.accepted_application().map(|a| a.seller_id) == Some(viewer.user_id)
                && !m.status.is_terminal()
        })
        .map(|m| build_card(m, &viewer))
        .collect();

    Ok(SellerDashboard {
        balance_xof,
        open_missions,
        active_missions,
    })
}

/// Withdrawal modal: the amount is checked against the balance before the
/// request goes out.
pub async fn request_withdrawal(
    api: &dyn MarketplaceApi,
    amount_xof: i64,
) -> Result<(), String> {
    let balance_xof = api.get_balance().await.map_err(user_err)?;
    validate_withdrawal(amount_xof, balance_xof).map_err(|errs| errs.join("; "))?;
    api.request_withdrawal(amount_xof).await.map_err(user_err)
}

pub async fn list_products(api: &dyn MarketplaceApi) -> Result<Vec<Product>, String> {
    api.list_products().await.map_err(user_err)
}

/// Mission board with the service-worker policy: network first, last good
/// copy when offline.
pub async fn list_missions_cached(
    api: &dyn MarketplaceApi,
    cache: &OfflineCache,
) -> Result<Vec<Mission>, String> {
    let (bytes, source) = cache
        .network_first("/freelance/missions", OFFLINE_JSON, || async {
            let missions = api.list_missions().await?;
            Ok(serde_json::to_vec(&missions)?)
        })
        .await
        .map_err(|e| e.to_string())?;

    if source == FetchSource::OfflineFallback {
        return Err("Hors ligne : aucune donnée disponible.".to_string());
    }
    if source == FetchSource::Cache {
        tracing::info!("mission board served from offline cache");
    }
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverableFile {
    pub path: String,
    pub size_bytes: u64,
}

/// Scan a folder for files attachable as deliverables.
pub async fn scan_deliverables(dir: String) -> Result<Vec<DeliverableFile>, String> {
    let path = PathBuf::from(dir);
    if !path.exists() || !path.is_dir() {
        return Err("Provided path is not a directory".to_string());
    }
    let mut result = Vec::new();
    for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_file() {
            let hidden = entry
                .file_name()
                .to_str()
                .map(|n| n.starts_with('.'))
                .unwrap_or(false);
            if hidden {
                continue;
            }
            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            result.push(DeliverableFile {
                path: entry.path().display().to_string(),
                size_bytes,
            });
        }
    }
    Ok(result)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub api_kind: String,
    pub base_url: Option<String>,
    pub conversation_interval_secs: u64,
}

pub async fn get_settings() -> Result<Settings, String> {
    let cfg = config::load().map_err(|e| e.to_string())?;
    Ok(Settings {
        api_kind: cfg.api.kind,
        base_url: cfg.api.base_url,
        conversation_interval_secs: cfg.polling.conversation_interval_secs,
    })
}

pub async fn update_settings(settings: Settings) -> Result<(), String> {
    let mut cfg = config::load().unwrap_or_default();

    cfg.api.kind = settings.api_kind;
    cfg.api.base_url = settings.base_url;
    cfg.polling.conversation_interval_secs = settings.conversation_interval_secs;

    config::store(&cfg).map_err(|e| e.to_string())?;
    tracing::info!("Settings updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::mock::MockApi;
    use chrono::Utc;
    use sokoni_core::models::Mission;

    fn open_mission(owner_id: i64) -> Mission {
        Mission {
            id: 1,
            owner_id,
            title: "Identité visuelle".to_string(),
            description: "Logo et charte".to_string(),
            category: "design".to_string(),
            budget_xof: 60_000,
            final_price_xof: None,
            status: MissionStatus::Open,
            applications: vec![Application {
                id: 1,
                mission_id: 1,
                seller_id: 2,
                proposal: "Disponible dès lundi".to_string(),
                proposed_price_xof: 5_000,
                accepted: false,
            }],
            delivery: None,
            deadline: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn owner_card_offers_accept_per_application() {
        let api = MockApi::new();
        // Mock login maps buyer emails to user id 1.
        api.seed_mission(open_mission(1)).await;
        let session = SessionHandle::new();
        login(api.as_ref(), &session, "acheteur@sokoni.example", "pw")
            .await
            .unwrap();

        let card = mission_card(api.as_ref(), &session, 1).await.unwrap();
        assert_eq!(card.badge, "Ouverte");
        assert_eq!(card.actions.len(), 1);
        assert_eq!(card.actions[0].action, MissionAction::AcceptApplication(1));
        assert_eq!(card.actions[0].label, "Accepter");
    }

    #[tokio::test]
    async fn seller_card_offers_postuler_only() {
        let api = MockApi::new();
        // Owner is someone else; mock login maps seller emails to user id 2,
        // so keep the applicant distinct as well.
        let mut mission = open_mission(1);
        mission.applications[0].seller_id = 5;
        api.seed_mission(mission).await;
        let session = SessionHandle::new();
        login(api.as_ref(), &session, "vendeur@sokoni.example", "pw")
            .await
            .unwrap();

        let card = mission_card(api.as_ref(), &session, 1).await.unwrap();
        assert_eq!(card.actions.len(), 1);
        assert_eq!(card.actions[0].action, MissionAction::Apply);
        assert_eq!(card.actions[0].label, "Postuler");
    }

    #[tokio::test]
    async fn mission_card_requires_a_session() {
        let api = MockApi::new();
        api.seed_mission(open_mission(1)).await;
        let session = SessionHandle::new();
        assert!(mission_card(api.as_ref(), &session, 1).await.is_err());
    }

    #[tokio::test]
    async fn withdrawal_modal_blocks_amounts_over_balance() {
        let api = MockApi::new(); // mock balance: 120 000 XOF
        let err = request_withdrawal(api.as_ref(), 500_000).await.unwrap_err();
        assert!(err.contains("exceeds"));

        request_withdrawal(api.as_ref(), 20_000).await.unwrap();
    }

    #[tokio::test]
    async fn withdrawal_modal_blocks_non_positive_amounts() {
        let api = MockApi::new();
        assert!(request_withdrawal(api.as_ref(), 0).await.is_err());
        assert!(request_withdrawal(api.as_ref(), -100).await.is_err());
    }

    #[tokio::test]
    async fn post_mission_validates_before_calling() {
        let api = MockApi::new();
        let draft = MissionDraft {
            title: "".to_string(),
            description: "Une description".to_string(),
            category: "web".to_string(),
            budget_xof: 30_000,
            deadline: None,
        };
        let err = post_mission(api.as_ref(), draft).await.unwrap_err();
        assert!(err.contains("Title"));

        let draft = MissionDraft {
            title: "Landing page".to_string(),
            description: "Une page, responsive".to_string(),
            category: "web".to_string(),
            budget_xof: 30_000,
            deadline: None,
        };
        let mission = post_mission(api.as_ref(), draft).await.unwrap();
        assert_eq!(mission.status, MissionStatus::Open);
    }

    #[tokio::test]
    async fn apply_rejects_an_empty_proposal_before_any_call() {
        let api = MockApi::new();
        api.seed_mission(open_mission(1)).await;
        let err = apply_to_mission(api.as_ref(), 1, "  ", 5_000)
            .await
            .unwrap_err();
        assert!(err.contains("Proposal"));
    }

    #[tokio::test]
    async fn submit_delivery_hashes_and_uploads_the_file() {
        let api = MockApi::new();
        let mut mission = open_mission(1);
        mission.applications[0].accepted = true;
        mission.final_price_xof = Some(5_000);
        mission.status = MissionStatus::InProgress;
        api.seed_mission(mission).await;

        let path = std::env::temp_dir().join("sokoni-test-livrable.pdf");
        std::fs::write(&path, b"maquette finale").unwrap();

        let delivery = submit_delivery(
            api.as_ref(),
            1,
            path.to_str().unwrap(),
            "Premier rendu",
        )
        .await
        .unwrap();
        assert_eq!(delivery.file_name, "sokoni-test-livrable.pdf");
        assert_eq!(delivery.mime_type, "application/pdf");
        assert_eq!(delivery.size_bytes, 15);
        assert_eq!(delivery.sha256.len(), 64);

        assert_eq!(
            api.get_mission(1).await.unwrap().status,
            MissionStatus::AwaitingValidation
        );
        assert_eq!(
            download_delivery(api.as_ref(), 1).await.unwrap(),
            b"maquette finale".to_vec()
        );
    }

    #[tokio::test]
    async fn mission_board_survives_a_network_outage() {
        let api = MockApi::new();
        api.seed_mission(open_mission(1)).await;
        let cache = OfflineCache::temporary().unwrap();

        let fresh = list_missions_cached(api.as_ref(), &cache).await.unwrap();
        assert_eq!(fresh.len(), 1);

        // Same cache, dead backend: the last good copy is served.
        let dead = MockApi::bare().with_unavailable_backend();
        let cached = list_missions_cached(&dead, &cache).await.unwrap();
        assert_eq!(cached.len(), 1);

        // Dead backend and an empty cache: the offline payload surfaces
        // as a user-facing error, not stale data.
        let empty_cache = OfflineCache::temporary().unwrap();
        assert!(list_missions_cached(&dead, &empty_cache).await.is_err());
    }

    #[tokio::test]
    async fn scan_deliverables_skips_hidden_files() {
        let dir = std::env::temp_dir().join("sokoni-test-deliverables");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("rendu.zip"), b"zip").unwrap();
        std::fs::write(dir.join(".DS_Store"), b"junk").unwrap();

        let files = scan_deliverables(dir.display().to_string()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("rendu.zip"));
    }
}
