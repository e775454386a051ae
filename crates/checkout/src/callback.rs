//! Payment-provider callback page logic: read the transaction and order
//! identifiers from the return URL, nothing else. Verification is a
//! separate server call; the provider's redirect is never trusted alone.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub transaction_id: String,
    pub order_id: String,
}

impl CallbackParams {
    /// Parse `transaction_id` and `order_id` from an absolute callback URL.
    /// Both are required; the provider appends them on every return.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(url).context("invalid callback URL")?;

        let mut transaction_id = None;
        let mut order_id = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "transaction_id" => transaction_id = Some(value.into_owned()),
                "order_id" => order_id = Some(value.into_owned()),
                _ => {}
            }
        }

        let Some(transaction_id) = transaction_id else {
            bail!("missing transaction_id in callback URL");
        };
        let Some(order_id) = order_id else {
            bail!("missing order_id in callback URL");
        };

        Ok(Self {
            transaction_id,
            order_id,
        })
    }
}

/// What the callback page displays once verification has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success { order_id: String },
    Failed { message: String },
}

impl PaymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentOutcome::Success { .. })
    }

    pub fn display_state(&self) -> &'static str {
        match self {
            PaymentOutcome::Success { .. } => "success",
            PaymentOutcome::Failed { .. } => "failed",
        }
    }

    /// Where the page sends the user next: dashboard on success, back to
    /// home with a retry entry point on failure.
    pub fn next_route(&self) -> &'static str {
        match self {
            PaymentOutcome::Success { .. } => "/dashboard",
            PaymentOutcome::Failed { .. } => "/",
        }
    }
}
