//! In-memory stand-in for the marketplace backend. Used as the default
//! provider when no base URL is configured, and by the flow tests. It
//! enforces the same transition rules the real backend does, so illegal
//! client behavior fails here too.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};

use sokoni_core::guards::Role;
use sokoni_core::lifecycle::MissionStatus;
use sokoni_core::models::{
    Application, ApplicationDraft, ApplicationId, Conversation, Delivery, DeliveryUpload, Message,
    Mission, MissionDraft, MissionId, Order, OrderStatus, Product, ProductId,
};
use sokoni_core::validation::validate_mission_draft;

use crate::error::{ApiError, ApiResult};
use crate::{AuthSession, AuthUser, CheckoutRedirect, MarketplaceApi, VerificationOutcome};

pub struct MockApi {
    state: RwLock<MockState>,
    latency: Duration,
    fail_verification: bool,
    verification_status: String,
    checkout_url_override: Option<String>,
    unavailable: bool,
}

#[derive(Default)]
struct MockState {
    missions: HashMap<MissionId, Mission>,
    products: Vec<Product>,
    conversations: HashMap<MissionId, Conversation>,
    orders: HashMap<String, Order>,
    delivery_files: HashMap<MissionId, Vec<u8>>,
    order_updates: Vec<(String, OrderStatus)>,
    balance_xof: i64,
    next_id: i64,
}

fn rand_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::bare())
    }

    pub fn bare() -> Self {
        Self {
            state: RwLock::new(MockState {
                balance_xof: 120_000,
                next_id: 100,
                ..Default::default()
            }),
            latency: Duration::from_millis(20),
            fail_verification: false,
            verification_status: "success".to_string(),
            checkout_url_override: None,
            unavailable: false,
        }
    }

    /// Every `verify_transaction` call rejects, as if the provider were
    /// unreachable.
    pub fn with_failing_verification(mut self) -> Self {
        self.fail_verification = true;
        self
    }

    /// The whole backend answers 503, for offline-path tests.
    pub fn with_unavailable_backend(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check_available(&self) -> ApiResult<()> {
        if self.unavailable {
            return Err(ApiError::Server {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }

    /// `verify_transaction` answers, but with the given status instead of
    /// `success`.
    pub fn with_verification_status(mut self, status: &str) -> Self {
        self.verification_status = status.to_string();
        self
    }

    pub fn with_checkout_url(mut self, url: &str) -> Self {
        self.checkout_url_override = Some(url.to_string());
        self
    }

    pub fn with_demo_data() -> Arc<Self> {
        let now = Utc::now();
        let mut state = MockState {
            balance_xof: 120_000,
            next_id: 100,
            ..Default::default()
        };

        state.products.push(Product {
            id: 1,
            seller_id: 2,
            name: "Gabarit de facture".to_string(),
            description: "Modèle prêt à l'emploi".to_string(),
            price_xof: 5_000,
            stock: 40,
        });
        state.products.push(Product {
            id: 2,
            seller_id: 2,
            name: "Pack d'icônes".to_string(),
            description: "120 icônes vectorielles".to_string(),
            price_xof: 8_000,
            stock: 15,
        });

        state.missions.insert(
            1,
            Mission {
                id: 1,
                owner_id: 1,
                title: "Refonte du logo".to_string(),
                description: "Logo vectoriel + déclinaisons".to_string(),
                category: "design".to_string(),
                budget_xof: 60_000,
                final_price_xof: None,
                status: MissionStatus::Open,
                applications: vec![Application {
                    id: 11,
                    mission_id: 1,
                    seller_id: 2,
                    proposal: "Trois propositions sous 5 jours".to_string(),
                    proposed_price_xof: 45_000,
                    accepted: false,
                }],
                delivery: None,
                deadline: None,
                created_at: now,
            },
        );

        state.conversations.insert(
            1,
            Conversation {
                id: 1,
                mission_id: 1,
                messages: vec![Message {
                    id: 1,
                    sender_id: 2,
                    body: "Bonjour, des précisions sur les couleurs ?".to_string(),
                    sent_at: now,
                }],
            },
        );

        Arc::new(Self {
            state: RwLock::new(state),
            latency: Duration::from_millis(20),
            fail_verification: false,
            verification_status: "success".to_string(),
            checkout_url_override: None,
            unavailable: false,
        })
    }

    pub async fn seed_mission(&self, mission: Mission) {
        let mut guard = self.state.write().await;
        guard.missions.insert(mission.id, mission);
    }

    /// Order-status calls the client issued, in order. Lets tests assert
    /// that a failed verification mutated nothing.
    pub async fn recorded_order_updates(&self) -> Vec<(String, OrderStatus)> {
        self.state.read().await.order_updates.clone()
    }

    pub async fn order(&self, order_id: &str) -> Option<Order> {
        self.state.read().await.orders.get(order_id).cloned()
    }

    async fn simulate_latency(&self) {
        sleep(self.latency).await;
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::bare()
    }
}

#[async_trait]
impl MarketplaceApi for MockApi {
    async fn login(&self, email: &str, _password: &str) -> ApiResult<AuthSession> {
        self.simulate_latency().await;
        let role = if email.contains("admin") {
            Role::Admin
        } else if email.contains("vendeur") || email.contains("seller") {
            Role::Seller
        } else {
            Role::Buyer
        };
        let id = match role {
            Role::Buyer => 1,
            Role::Seller => 2,
            Role::Admin => 3,
        };
        Ok(AuthSession {
            token: rand_id(32),
            user: AuthUser {
                id,
                role,
                display_name: email.split('@').next().unwrap_or(email).to_string(),
            },
        })
    }

    async fn logout(&self) -> ApiResult<()> {
        Ok(())
    }

    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        self.check_available()?;
        self.simulate_latency().await;
        Ok(self.state.read().await.products.clone())
    }

    async fn get_product(&self, id: ProductId) -> ApiResult<Product> {
        self.state
            .read()
            .await
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn list_missions(&self) -> ApiResult<Vec<Mission>> {
        self.check_available()?;
        self.simulate_latency().await;
        let mut missions: Vec<Mission> = self.state.read().await.missions.values().cloned().collect();
        missions.sort_by_key(|m| m.id);
        Ok(missions)
    }

    async fn get_mission(&self, id: MissionId) -> ApiResult<Mission> {
        self.state
            .read()
            .await
            .missions
            .get(&id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn create_mission(&self, draft: &MissionDraft) -> ApiResult<Mission> {
        if let Err(errs) = validate_mission_draft(draft) {
            return Err(ApiError::Validation {
                message: errs.join("; "),
            });
        }
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.next_id += 1;
        let mission = Mission {
            id: state.next_id,
            owner_id: 1,
            title: draft.title.clone(),
            description: draft.description.clone(),
            category: draft.category.clone(),
            budget_xof: draft.budget_xof,
            final_price_xof: None,
            status: MissionStatus::Open,
            applications: Vec::new(),
            delivery: None,
            deadline: draft.deadline,
            created_at: Utc::now(),
        };
        state.missions.insert(mission.id, mission.clone());
        Ok(mission)
    }

    async fn apply_to_mission(
        &self,
        mission_id: MissionId,
        draft: &ApplicationDraft,
    ) -> ApiResult<Application> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.next_id += 1;
        let id = state.next_id;
        let mission = state.missions.get_mut(&mission_id).ok_or(ApiError::NotFound)?;
        if mission.status != MissionStatus::Open {
            return Err(ApiError::Conflict);
        }
        let application = Application {
            id,
            mission_id,
            seller_id: 2,
            proposal: draft.proposal.clone(),
            proposed_price_xof: draft.proposed_price_xof,
            accepted: false,
        };
        mission.applications.push(application.clone());
        Ok(application)
    }

    async fn accept_application(
        &self,
        mission_id: MissionId,
        application_id: ApplicationId,
    ) -> ApiResult<Order> {
        self.simulate_latency().await;
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mission = state.missions.get_mut(&mission_id).ok_or(ApiError::NotFound)?;
        if mission.status != MissionStatus::Open || mission.accepted_application().is_some() {
            return Err(ApiError::Conflict);
        }
        let application = mission
            .applications
            .iter_mut()
            .find(|a| a.id == application_id)
            .ok_or(ApiError::NotFound)?;
        application.accepted = true;
        let price = application.proposed_price_xof;
        mission.final_price_xof = Some(price);
        mission
            .apply_transition(MissionStatus::PendingPayment)
            .map_err(|_| ApiError::Conflict)?;

        let order = Order {
            id: format!("ord-{}", rand_id(10)),
            mission_id: Some(mission_id),
            product_id: None,
            amount_xof: price,
            status: OrderStatus::Pending,
        };
        state.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn submit_delivery(
        &self,
        mission_id: MissionId,
        upload: &DeliveryUpload,
    ) -> ApiResult<Delivery> {
        let content = BASE64
            .decode(&upload.content_base64)
            .map_err(|e| ApiError::Validation {
                message: format!("invalid base64 payload: {e}"),
            })?;
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.next_id += 1;
        let id = state.next_id;
        let mission = state.missions.get_mut(&mission_id).ok_or(ApiError::NotFound)?;
        if mission.status != MissionStatus::InProgress {
            return Err(ApiError::Conflict);
        }
        let seller_id = mission
            .accepted_application()
            .map(|a| a.seller_id)
            .ok_or(ApiError::Conflict)?;
        let delivery = Delivery {
            id,
            mission_id,
            seller_id,
            file_name: upload.file_name.clone(),
            mime_type: upload.mime_type.clone(),
            size_bytes: upload.size_bytes,
            sha256: upload.sha256.clone(),
            note: upload.note.clone(),
            submitted_at: Utc::now(),
        };
        mission.delivery = Some(delivery.clone());
        mission
            .apply_transition(MissionStatus::AwaitingValidation)
            .map_err(|_| ApiError::Conflict)?;
        state.delivery_files.insert(mission_id, content);
        Ok(delivery)
    }

    async fn validate_delivery(&self, mission_id: MissionId) -> ApiResult<Mission> {
        let mut guard = self.state.write().await;
        let mission = guard.missions.get_mut(&mission_id).ok_or(ApiError::NotFound)?;
        mission
            .apply_transition(MissionStatus::Completed)
            .map_err(|_| ApiError::Conflict)?;
        Ok(mission.clone())
    }

    async fn download_delivery(&self, mission_id: MissionId) -> ApiResult<Vec<u8>> {
        self.state
            .read()
            .await
            .delivery_files
            .get(&mission_id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn initiate_checkout(&self, order_id: &str) -> ApiResult<CheckoutRedirect> {
        self.simulate_latency().await;
        let guard = self.state.read().await;
        let order = guard.orders.get(order_id).ok_or(ApiError::NotFound)?;
        let checkout_url = self
            .checkout_url_override
            .clone()
            .unwrap_or_else(|| format!("https://checkout.fedapay.example/{}", order.id));
        Ok(CheckoutRedirect {
            checkout_url,
            order_id: order.id.clone(),
        })
    }

    async fn verify_transaction(&self, transaction_id: &str) -> ApiResult<VerificationOutcome> {
        self.simulate_latency().await;
        if self.fail_verification {
            return Err(ApiError::Server {
                status: 502,
                message: "payment provider unavailable".to_string(),
            });
        }
        Ok(VerificationOutcome {
            transaction_id: transaction_id.to_string(),
            status: self.verification_status.clone(),
            message: None,
        })
    }

    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> ApiResult<Order> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let order = state.orders.get_mut(order_id).ok_or(ApiError::NotFound)?;
        order.status = status;
        let updated = order.clone();
        state.order_updates.push((order_id.to_string(), status));

        // Paying the escrow releases the mission to the accepted seller.
        if status == OrderStatus::Paid {
            if let Some(mission_id) = updated.mission_id {
                if let Some(mission) = state.missions.get_mut(&mission_id) {
                    mission
                        .apply_transition(MissionStatus::InProgress)
                        .map_err(|_| ApiError::Conflict)?;
                }
            }
        }
        Ok(updated)
    }

    async fn get_conversation(&self, mission_id: MissionId) -> ApiResult<Conversation> {
        self.simulate_latency().await;
        let guard = self.state.read().await;
        if !guard.missions.contains_key(&mission_id) {
            return Err(ApiError::NotFound);
        }
        Ok(guard
            .conversations
            .get(&mission_id)
            .cloned()
            .unwrap_or(Conversation {
                id: mission_id,
                mission_id,
                messages: Vec::new(),
            }))
    }

    async fn send_message(&self, mission_id: MissionId, body: &str) -> ApiResult<Message> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if !state.missions.contains_key(&mission_id) {
            return Err(ApiError::NotFound);
        }
        state.next_id += 1;
        let message = Message {
            id: state.next_id,
            sender_id: 1,
            body: body.to_string(),
            sent_at: Utc::now(),
        };
        let conversation = state
            .conversations
            .entry(mission_id)
            .or_insert(Conversation {
                id: mission_id,
                mission_id,
                messages: Vec::new(),
            });
        conversation.messages.push(message.clone());
        Ok(message)
    }

    async fn get_balance(&self) -> ApiResult<i64> {
        Ok(self.state.read().await.balance_xof)
    }

    async fn request_withdrawal(&self, amount_xof: i64) -> ApiResult<()> {
        let mut guard = self.state.write().await;
        if amount_xof <= 0 {
            return Err(ApiError::Validation {
                message: "Montant invalide".to_string(),
            });
        }
        if amount_xof > guard.balance_xof {
            return Err(ApiError::Validation {
                message: "Solde insuffisant".to_string(),
            });
        }
        guard.balance_xof -= amount_xof;
        Ok(())
    }
}
