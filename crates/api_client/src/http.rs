use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use sokoni_core::models::{
    Application, ApplicationDraft, ApplicationId, Conversation, Delivery, DeliveryUpload, Message,
    Mission, MissionDraft, MissionId, Order, OrderStatus, Product, ProductId,
};

use crate::error::{ApiError, ApiResult};
use crate::session::SessionHandle;
use crate::{AuthSession, CheckoutRedirect, MarketplaceApi, VerificationOutcome};

/// REST client for the marketplace backend. Holds the session handle so
/// the bearer header and the 401-clears-session rule live in one place.
#[derive(Clone)]
pub struct HttpApiClient {
    base_url: String,
    http: reqwest::Client,
    session: SessionHandle,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct WithdrawalRequest {
    amount_xof: i64,
}

#[derive(Debug, Serialize)]
struct InitiateRequest<'a> {
    order_id: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    transaction_id: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderStatusRequest {
    status: OrderStatus,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance_xof: i64,
}

impl HttpApiClient {
    pub fn new(base_url: String, session: SessionHandle) -> Arc<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Arc::new(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut rb = self.http.request(method, self.url(path));
        if let Some(token) = self.session.token().await {
            rb = rb.bearer_auth(token);
        }
        rb
    }

    /// Single interception point for every response, per-status handling
    /// as the backend contract defines it. A 401 clears the session before
    /// the error surfaces.
    async fn intercept(&self, resp: Response) -> ApiResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let err = ApiError::from_status(status, &body);
        match &err {
            ApiError::Unauthorized => {
                self.session.clear().await;
                tracing::warn!("401 received, session cleared");
            }
            ApiError::Forbidden { admin_required } => {
                tracing::warn!(admin_required = *admin_required, "403 received");
            }
            ApiError::NotFound | ApiError::Conflict | ApiError::Server { .. } => {
                tracing::error!(status = status.as_u16(), "request failed");
            }
            _ => {}
        }
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        rb: RequestBuilder,
        what: &'static str,
    ) -> ApiResult<T> {
        let resp = rb.send().await?;
        let resp = self.intercept(resp).await?;
        resp.json::<T>().await.map_err(|e| ApiError::Decode {
            context: format!("{what}: {e}"),
        })
    }

    async fn send_unit(&self, rb: RequestBuilder) -> ApiResult<()> {
        let resp = rb.send().await?;
        self.intercept(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl MarketplaceApi for HttpApiClient {
    async fn login(&self, email: &str, password: &str) -> ApiResult<AuthSession> {
        let rb = self
            .request(Method::POST, "/auth/login")
            .await
            .json(&LoginRequest { email, password });
        let auth: AuthSession = self.send_json(rb, "login").await?;
        tracing::info!(user_id = auth.user.id, "login succeeded");
        Ok(auth)
    }

    async fn logout(&self) -> ApiResult<()> {
        let rb = self.request(Method::POST, "/auth/logout").await;
        self.send_unit(rb).await
    }

    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        let rb = self.request(Method::GET, "/products").await;
        self.send_json(rb, "list products").await
    }

    async fn get_product(&self, id: ProductId) -> ApiResult<Product> {
        let rb = self.request(Method::GET, &format!("/products/{id}")).await;
        self.send_json(rb, "get product").await
    }

    async fn list_missions(&self) -> ApiResult<Vec<Mission>> {
        let rb = self.request(Method::GET, "/freelance/missions").await;
        self.send_json(rb, "list missions").await
    }

    async fn get_mission(&self, id: MissionId) -> ApiResult<Mission> {
        let rb = self
            .request(Method::GET, &format!("/freelance/missions/{id}"))
            .await;
        self.send_json(rb, "get mission").await
    }

    async fn create_mission(&self, draft: &MissionDraft) -> ApiResult<Mission> {
        let rb = self
            .request(Method::POST, "/freelance/missions")
            .await
            .json(draft);
        self.send_json(rb, "create mission").await
    }

    async fn apply_to_mission(
        &self,
        mission_id: MissionId,
        draft: &ApplicationDraft,
    ) -> ApiResult<Application> {
        let rb = self
            .request(
                Method::POST,
                &format!("/freelance/missions/{mission_id}/applications"),
            )
            .await
            .json(draft);
        self.send_json(rb, "apply to mission").await
    }

    async fn accept_application(
        &self,
        mission_id: MissionId,
        application_id: ApplicationId,
    ) -> ApiResult<Order> {
        let rb = self
            .request(
                Method::POST,
                &format!("/freelance/missions/{mission_id}/applications/{application_id}/accept"),
            )
            .await;
        let order: Order = self.send_json(rb, "accept application").await?;
        tracing::info!(mission_id, application_id, order_id = %order.id, "application accepted");
        Ok(order)
    }

    async fn submit_delivery(
        &self,
        mission_id: MissionId,
        upload: &DeliveryUpload,
    ) -> ApiResult<Delivery> {
        let rb = self
            .request(
                Method::POST,
                &format!("/freelance/missions/{mission_id}/delivery"),
            )
            .await
            .json(upload);
        self.send_json(rb, "submit delivery").await
    }

    async fn validate_delivery(&self, mission_id: MissionId) -> ApiResult<Mission> {
        let rb = self
            .request(
                Method::POST,
                &format!("/freelance/missions/{mission_id}/delivery/validate"),
            )
            .await;
        self.send_json(rb, "validate delivery").await
    }

    async fn download_delivery(&self, mission_id: MissionId) -> ApiResult<Vec<u8>> {
        let rb = self
            .request(
                Method::GET,
                &format!("/freelance/missions/{mission_id}/delivery/file"),
            )
            .await;
        let resp = rb.send().await?;
        let resp = self.intercept(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn initiate_checkout(&self, order_id: &str) -> ApiResult<CheckoutRedirect> {
        let rb = self
            .request(Method::POST, "/fedapay/initiate")
            .await
            .json(&InitiateRequest { order_id });
        let redirect: CheckoutRedirect = self.send_json(rb, "initiate checkout").await?;
        tracing::info!(order_id = %redirect.order_id, "checkout initiated");
        Ok(redirect)
    }

    async fn verify_transaction(&self, transaction_id: &str) -> ApiResult<VerificationOutcome> {
        let rb = self
            .request(Method::POST, "/fedapay/verify")
            .await
            .json(&VerifyRequest { transaction_id });
        self.send_json(rb, "verify transaction").await
    }

    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> ApiResult<Order> {
        let rb = self
            .request(Method::POST, &format!("/orders/{order_id}/status"))
            .await
            .json(&OrderStatusRequest { status });
        self.send_json(rb, "update order status").await
    }

    async fn get_conversation(&self, mission_id: MissionId) -> ApiResult<Conversation> {
        let rb = self
            .request(
                Method::GET,
                &format!("/freelance/missions/{mission_id}/conversation"),
            )
            .await;
        self.send_json(rb, "get conversation").await
    }

    async fn send_message(&self, mission_id: MissionId, body: &str) -> ApiResult<Message> {
        let rb = self
            .request(
                Method::POST,
                &format!("/freelance/missions/{mission_id}/conversation/messages"),
            )
            .await
            .json(&MessageRequest { body });
        self.send_json(rb, "send message").await
    }

    async fn get_balance(&self) -> ApiResult<i64> {
        let rb = self.request(Method::GET, "/wallet/balance").await;
        let balance: BalanceResponse = self.send_json(rb, "get balance").await?;
        Ok(balance.balance_xof)
    }

    async fn request_withdrawal(&self, amount_xof: i64) -> ApiResult<()> {
        let rb = self
            .request(Method::POST, "/wallet/withdrawals")
            .await
            .json(&WithdrawalRequest { amount_xof });
        self.send_unit(rb).await
    }
}
