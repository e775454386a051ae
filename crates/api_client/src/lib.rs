use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sokoni_core::guards::Role;
use sokoni_core::models::{
    Application, ApplicationDraft, ApplicationId, Conversation, Delivery, DeliveryUpload, Message,
    Mission, MissionDraft, MissionId, Order, OrderStatus, Product, ProductId, UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub role: Role,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: AuthUser,
}

/// Server reply to an escrow initiation. `checkout_url` is the hosted
/// payment page; the caller navigates to it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRedirect {
    pub checkout_url: String,
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub transaction_id: String,
    pub status: String,
    pub message: Option<String>,
}

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// One method per remote operation the marketplace page issues. All
/// business state is server-side; every call is a request for the server
/// to act or to report.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> ApiResult<AuthSession>;
    async fn logout(&self) -> ApiResult<()>;

    async fn list_products(&self) -> ApiResult<Vec<Product>>;
    async fn get_product(&self, id: ProductId) -> ApiResult<Product>;

    async fn list_missions(&self) -> ApiResult<Vec<Mission>>;
    async fn get_mission(&self, id: MissionId) -> ApiResult<Mission>;
    async fn create_mission(&self, draft: &MissionDraft) -> ApiResult<Mission>;
    async fn apply_to_mission(
        &self,
        mission_id: MissionId,
        draft: &ApplicationDraft,
    ) -> ApiResult<Application>;
    async fn accept_application(
        &self,
        mission_id: MissionId,
        application_id: ApplicationId,
    ) -> ApiResult<Order>;
    async fn submit_delivery(
        &self,
        mission_id: MissionId,
        upload: &DeliveryUpload,
    ) -> ApiResult<Delivery>;
    async fn validate_delivery(&self, mission_id: MissionId) -> ApiResult<Mission>;
    async fn download_delivery(&self, mission_id: MissionId) -> ApiResult<Vec<u8>>;

    async fn initiate_checkout(&self, order_id: &str) -> ApiResult<CheckoutRedirect>;
    async fn verify_transaction(&self, transaction_id: &str) -> ApiResult<VerificationOutcome>;
    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> ApiResult<Order>;

    async fn get_conversation(&self, mission_id: MissionId) -> ApiResult<Conversation>;
    async fn send_message(&self, mission_id: MissionId, body: &str) -> ApiResult<Message>;

    async fn get_balance(&self) -> ApiResult<i64>;
    async fn request_withdrawal(&self, amount_xof: i64) -> ApiResult<()>;
}

pub mod error;
pub mod http;
pub mod mock;
pub mod session;

pub use error::{ApiError, ApiResult};
pub use session::{SessionContext, SessionHandle};
