use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::MissionStatus;

pub type UserId = i64;
pub type MissionId = i64;
pub type ApplicationId = i64;
pub type ProductId = i64;

/// A freelance mission as the backend serves it. The client never owns an
/// authoritative copy; `status` is only ever changed by applying a
/// transition the server has confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Upper bound on spend, integer XOF (the franc has no minor unit).
    pub budget_xof: i64,
    /// Set once an application has been accepted.
    pub final_price_xof: Option<i64>,
    pub status: MissionStatus,
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub delivery: Option<Delivery>,
    pub deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Mission {
    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    /// At most one application is ever accepted per mission.
    pub fn accepted_application(&self) -> Option<&Application> {
        self.applications.iter().find(|a| a.accepted)
    }
}

/// A seller's bid on a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub mission_id: MissionId,
    pub seller_id: UserId,
    pub proposal: String,
    pub proposed_price_xof: i64,
    #[serde(default)]
    pub accepted: bool,
}

/// File + note submitted by the accepted seller. Submitting one moves the
/// mission to `awaiting_validation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: i64,
    pub mission_id: MissionId,
    pub seller_id: UserId,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub note: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub name: String,
    pub description: String,
    pub price_xof: i64,
    pub stock: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

/// Escrow order created server-side when an application is accepted.
/// Order ids are opaque payment-provider references, not backend row ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub mission_id: Option<MissionId>,
    pub product_id: Option<ProductId>,
    pub amount_xof: i64,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub mission_id: MissionId,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Input for creating a mission. Checked client-side before the call,
/// re-checked server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub budget_xof: i64,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub proposal: String,
    pub proposed_price_xof: i64,
}

/// Delivery file payload, carried base64 inside the JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryUpload {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub note: String,
    pub content_base64: String,
}
