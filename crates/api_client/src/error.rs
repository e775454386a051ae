//! One closed error taxonomy for every backend response, keyed on HTTP
//! status. No retry, no backoff; a failed call surfaces one message and
//! leaves local state untouched.

use serde::Deserialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 — the server rejected the payload; message is server-supplied.
    #[error("{message}")]
    Validation { message: String },

    /// 401 — session invalid or expired. The client clears its session
    /// before surfacing this.
    #[error("session expired or missing")]
    Unauthorized,

    /// 403 — `admin_required` is set when the backend asks for an admin
    /// login rather than plain insufficient rights.
    #[error("forbidden (admin login required: {admin_required})")]
    Forbidden { admin_required: bool },

    #[error("resource not found")]
    NotFound,

    #[error("conflicting state on server")]
    Conflict,

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response shape: {context}")]
    Decode { context: String },
}

/// Error bodies the backend sends; every field is optional because 5xx
/// pages are not guaranteed to be JSON at all.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    admin_required: Option<bool>,
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        match status.as_u16() {
            400 => ApiError::Validation {
                message: parsed
                    .message
                    .unwrap_or_else(|| "invalid request".to_string()),
            },
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden {
                admin_required: parsed.admin_required.unwrap_or(false),
            },
            404 => ApiError::NotFound,
            409 => ApiError::Conflict,
            s => ApiError::Server {
                status: s,
                message: parsed
                    .message
                    .unwrap_or_else(|| body.chars().take(200).collect()),
            },
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Text for the blocking alert/toast the shell shows. Generic unless
    /// the server supplied something better.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation { message } => message.clone(),
            ApiError::Unauthorized => "Session expirée, veuillez vous reconnecter.".to_string(),
            ApiError::Forbidden { admin_required: true } => {
                "Connexion administrateur requise.".to_string()
            }
            ApiError::Forbidden { admin_required: false } => "Accès refusé.".to_string(),
            ApiError::NotFound => "Ressource introuvable.".to_string(),
            ApiError::Conflict => "Cette opération n'est plus possible.".to_string(),
            ApiError::Server { .. } | ApiError::Transport(_) | ApiError::Decode { .. } => {
                "Une erreur est survenue, veuillez réessayer.".to_string()
            }
        }
    }
}
